use ecl_io::ecl::codec::endian;
use ecl_io::ecl::format::keyword::{read_keyword, write_keyword};
use ecl_io::{ECL_ENDIAN_FLIP, Fortio, Keyword, KeywordData, RecordStatus};
use std::path::Path;
use tempfile::TempDir;

/// Keywords covering every element type. Float values are exactly
/// representable in the formatted layout.
fn sample_keywords() -> Vec<Keyword> {
    vec![
        Keyword::new_int("INTEHEAD", (0..2500).map(|i| i * 7 - 300).collect()).unwrap(),
        Keyword::new_float("PORO", vec![0.5, 1.25, -3.0, 1e6, 0.0025, 0.0, 0.1]).unwrap(),
        Keyword::new_double("DOUBHEAD", vec![3.141592653589, -1.0, 0.0, 1e-12, 2.5e20]).unwrap(),
        Keyword::new_bool("LOGIHEAD", (0..60).map(|i| i % 3 == 0).collect()).unwrap(),
        Keyword::new_char(
            "ZWEL",
            &(0..250).map(|i| format!("W{}", i)).collect::<Vec<_>>(),
        )
        .unwrap(),
        Keyword::new_char("KEYWORDS", &["OIL", "", "ABCDEFGH"]).unwrap(),
        Keyword::new_string("NAMES", 12, &["LONG NAME 12", "x", ""]).unwrap(),
        Keyword::new_mess("STARTSOL").unwrap(),
        Keyword::new_int("EMPTY", Vec::new()).unwrap(),
    ]
}

fn write_all(path: &Path, fmt_file: bool, keywords: &[Keyword]) {
    let mut fortio = Fortio::open_writer(path, fmt_file, ECL_ENDIAN_FLIP).unwrap();
    for kw in keywords {
        write_keyword(&mut fortio, kw).unwrap();
    }
    fortio.close().unwrap();
}

fn read_all(path: &Path, fmt_file: bool) -> Vec<Keyword> {
    let mut fortio = Fortio::open_reader(path, fmt_file, ECL_ENDIAN_FLIP).unwrap();
    let mut keywords = Vec::new();
    while let Some(kw) = read_keyword(&mut fortio).unwrap() {
        keywords.push(kw);
    }
    keywords
}

fn assert_same_bits(expected: &Keyword, actual: &Keyword) {
    assert!(expected.header_eq(actual), "header mismatch for {}", expected.name());
    match (expected.data(), actual.data()) {
        (KeywordData::Float(a), KeywordData::Float(b)) => {
            let a: Vec<u32> = a.iter().map(|v| v.to_bits()).collect();
            let b: Vec<u32> = b.iter().map(|v| v.to_bits()).collect();
            assert_eq!(a, b, "float bits differ for {}", expected.name());
        }
        (KeywordData::Double(a), KeywordData::Double(b)) => {
            let a: Vec<u64> = a.iter().map(|v| v.to_bits()).collect();
            let b: Vec<u64> = b.iter().map(|v| v.to_bits()).collect();
            assert_eq!(a, b, "double bits differ for {}", expected.name());
        }
        _ => assert!(expected.data_equal(actual), "data mismatch for {}", expected.name()),
    }
}

#[test]
fn every_type_round_trips_binary_and_formatted() {
    let dir = TempDir::new().unwrap();
    let keywords = sample_keywords();
    for (name, fmt_file) in [("CASE.INIT", false), ("CASE.FINIT", true)] {
        let path = dir.path().join(name);
        write_all(&path, fmt_file, &keywords);
        let loaded = read_all(&path, fmt_file);
        assert_eq!(loaded.len(), keywords.len(), "keyword count for {}", name);
        for (expected, actual) in keywords.iter().zip(&loaded) {
            assert_same_bits(expected, actual);
        }
    }
}

#[test]
fn binary_round_trip_is_bit_exact_for_awkward_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("AWKWARD.UNRST");
    let floats = vec![f32::MIN_POSITIVE, f32::MAX, -0.0, 1.0 / 3.0, 7.000_001];
    let doubles = vec![f64::EPSILON, f64::MIN, -0.0, 1.0 / 3.0, std::f64::consts::E];
    let keywords = vec![
        Keyword::new_float("SWAT", floats).unwrap(),
        Keyword::new_double("PRESSURE", doubles).unwrap(),
    ];
    write_all(&path, false, &keywords);
    for (expected, actual) in keywords.iter().zip(read_all(&path, false).iter()) {
        assert_same_bits(expected, actual);
    }
}

#[test]
fn formatted_file_keeps_extreme_doubles() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("EXTREME.FINIT");
    let values = vec![f64::MAX, 1.5e308, -1.0e-300];
    write_all(
        &path,
        true,
        &[Keyword::new_double("DOUBHEAD", values.clone()).unwrap()],
    );

    let loaded = read_all(&path, true);
    let back = loaded[0].as_doubles().unwrap();
    for (expected, actual) in values.iter().zip(back) {
        assert!(
            ((actual - expected) / expected).abs() < 1e-12,
            "{} came back as {}",
            expected,
            actual
        );
    }

    let nan_path = dir.path().join("NAN.FINIT");
    let mut fortio = Fortio::open_writer(&nan_path, true, ECL_ENDIAN_FLIP).unwrap();
    let nan = Keyword::new_double("DOUBHEAD", vec![1.0, f64::NAN]).unwrap();
    assert!(write_keyword(&mut fortio, &nan).is_err());
}

#[test]
fn foreign_byte_order_is_read_with_flipped_setting() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("SWAPPED.INIT");
    let mut fortio = Fortio::open_writer(&path, false, !ECL_ENDIAN_FLIP).unwrap();
    write_keyword(&mut fortio, &Keyword::new_int("A", vec![1, -2, 3]).unwrap()).unwrap();
    fortio.close().unwrap();

    assert_eq!(Fortio::guess_endian_flip(&path), Some(!ECL_ENDIAN_FLIP));
    let mut fortio = Fortio::open_reader(&path, false, !ECL_ENDIAN_FLIP).unwrap();
    let kw = read_keyword(&mut fortio).unwrap().unwrap();
    assert_eq!(kw.as_ints(), Some(&[1, -2, 3][..]));
}

#[test]
fn flipping_twice_restores_bytes() {
    let original: Vec<u8> = (0..=255u8).cycle().take(8 * 11).collect();
    for (element_size, count) in [(1, 88), (2, 44), (4, 22), (4, 21), (8, 11)] {
        let mut buf = original.clone();
        endian::flip_buffer(&mut buf, element_size, count);
        if element_size > 1 {
            assert_ne!(buf, original, "size {} should change bytes", element_size);
        }
        endian::flip_buffer(&mut buf, element_size, count);
        assert_eq!(buf, original, "size {} count {}", element_size, count);
    }
}

#[test]
#[should_panic(expected = "unsupported element size")]
fn flipping_unsupported_width_panics() {
    let mut buf = vec![0u8; 12];
    endian::flip_buffer(&mut buf, 3, 4);
}

#[test]
fn records_come_back_in_order_and_a_bad_tail_fails_one_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("RECORDS.DATA");
    let payloads: Vec<Vec<u8>> = vec![b"first".to_vec(), vec![7u8; 100], b"third record".to_vec()];

    let mut fortio = Fortio::open_writer(&path, false, ECL_ENDIAN_FLIP).unwrap();
    for payload in &payloads {
        fortio.fwrite_record(payload).unwrap();
    }
    fortio.close().unwrap();

    let mut fortio = Fortio::open_reader(&path, false, ECL_ENDIAN_FLIP).unwrap();
    for payload in &payloads {
        assert_eq!(fortio.read_record().unwrap().as_ref(), Some(payload));
    }
    assert_eq!(fortio.read_record().unwrap(), None);
    assert_eq!(Fortio::check_file(&path, ECL_ENDIAN_FLIP), RecordStatus::Ok);

    // trailing marker of the second record
    let mut bytes = std::fs::read(&path).unwrap();
    let tail = (4 + payloads[0].len() + 4) + 4 + payloads[1].len();
    bytes[tail + 3] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let mut fortio = Fortio::open_reader(&path, false, ECL_ENDIAN_FLIP).unwrap();
    assert_eq!(fortio.read_record().unwrap().as_ref(), Some(&payloads[0]));
    let err = fortio.read_record().unwrap_err();
    assert_eq!(err.record_status(), Some(RecordStatus::HeaderMismatch));
    assert_eq!(fortio.read_record().unwrap().as_ref(), Some(&payloads[2]));
    assert_eq!(
        Fortio::check_file(&path, ECL_ENDIAN_FLIP),
        RecordStatus::HeaderMismatch
    );
}

#[test]
fn truncated_file_reports_missing_tail() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("SHORT.DATA");
    let mut fortio = Fortio::open_writer(&path, false, ECL_ENDIAN_FLIP).unwrap();
    fortio.fwrite_record(b"payload").unwrap();
    fortio.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();
    assert_eq!(
        Fortio::check_file(&path, ECL_ENDIAN_FLIP),
        RecordStatus::MissingTail
    );
    assert!(!Fortio::looks_like_fortran_file(&path, ECL_ENDIAN_FLIP));
    assert_eq!(
        Fortio::check_file(dir.path().join("NOPE"), ECL_ENDIAN_FLIP),
        RecordStatus::NoEntry
    );
}
