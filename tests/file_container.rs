use ecl_io::ecl::format::keyword::write_keyword;
use ecl_io::{ECL_ENDIAN_FLIP, EclFile, Fortio, Keyword, OpenFlags};
use std::path::Path;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_file(path: &Path, fmt_file: bool, keywords: &[Keyword]) {
    let mut fortio = Fortio::open_writer(path, fmt_file, ECL_ENDIAN_FLIP).unwrap();
    for kw in keywords {
        write_keyword(&mut fortio, kw).unwrap();
    }
    fortio.close().unwrap();
}

fn restart_keywords() -> Vec<Keyword> {
    let mut keywords = Vec::new();
    for step in [5, 10] {
        keywords.push(Keyword::new_int("SEQNUM", vec![step]).unwrap());
        keywords.push(Keyword::new_int("INTEHEAD", vec![step; 20]).unwrap());
        keywords.push(Keyword::new_double("PRESSURE", vec![step as f64 * 10.0; 1500]).unwrap());
        keywords.push(Keyword::new_char("WELLS", &["OP_1", "INJ"]).unwrap());
    }
    keywords.push(Keyword::new_int("EMPTY", Vec::new()).unwrap());
    keywords
}

fn read_every_keyword(file: &mut EclFile) -> Vec<Keyword> {
    (0..file.num_kw())
        .map(|i| file.iget_kw(i).unwrap().unwrap().clone())
        .collect()
}

#[test]
fn repeated_access_gives_equal_keywords() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("CASE.UNRST");
    let expected = restart_keywords();
    write_file(&path, false, &expected);

    for flags in [OpenFlags::DEFAULT, OpenFlags::CLOSE_STREAM] {
        let mut file = EclFile::open(&path, flags).unwrap();
        assert_eq!(file.num_kw(), expected.len());
        if flags.contains(OpenFlags::CLOSE_STREAM) {
            assert!(!file.stream_is_open(), "stream should be released after indexing");
        }
        for (i, kw) in expected.iter().enumerate() {
            let first = file.iget_kw(i).unwrap().unwrap().clone();
            let second = file.iget_kw(i).unwrap().unwrap().clone();
            assert_eq!(first, second, "keyword {} differs between reads", i);
            assert_eq!(&first, kw, "keyword {} differs from what was written", i);
        }
        if flags.contains(OpenFlags::CLOSE_STREAM) {
            assert!(!file.stream_is_open(), "stream should be released after loading");
        }
    }
}

#[test]
fn lookup_misses_are_none_and_empty_keywords_are_found() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("CASE.UNRST");
    write_file(&path, false, &restart_keywords());
    let mut file = EclFile::open(&path, OpenFlags::DEFAULT).unwrap();

    assert!(file.iget_named_kw("SWAT", 0).unwrap().is_none());
    assert!(file.iget_named_kw("PRESSURE", 2).unwrap().is_none());
    assert!(file.iget_kw(file.num_kw()).unwrap().is_none());
    assert!(file.iget_named_header("SWAT", 0).is_none());

    let empty = file.iget_named_kw("EMPTY", 0).unwrap().expect("EMPTY is present");
    assert!(empty.is_empty());
    assert_eq!(file.num_named_kw("PRESSURE"), 2);
    assert_eq!(
        file.distinct_kw(),
        vec!["SEQNUM", "INTEHEAD", "PRESSURE", "WELLS", "EMPTY"]
    );
}

#[test]
fn report_blocks_are_selected_by_seqnum() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("CASE.FUNRST");
    write_file(&path, true, &restart_keywords());
    let mut file = EclFile::open(&path, OpenFlags::DEFAULT).unwrap();
    assert!(file.fmt_file());

    assert!(file.select_rstblock_report_step(10).unwrap());
    assert_eq!(file.num_kw(), 5);
    let pressure = file.iget_named_kw("PRESSURE", 0).unwrap().unwrap();
    assert_eq!(pressure.iget_double(0).unwrap(), 100.0);

    assert!(!file.select_rstblock_report_step(7).unwrap());
    file.select_global();
    assert_eq!(file.num_kw(), 9);
}

#[test]
fn load_all_fails_when_file_disappears() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let removed = dir.path().join("REMOVED.UNRST");
    let truncated = dir.path().join("TRUNCATED.UNRST");
    write_file(&removed, false, &restart_keywords());
    write_file(&truncated, false, &restart_keywords());

    let mut file = EclFile::open(&removed, OpenFlags::CLOSE_STREAM).unwrap();
    std::fs::remove_file(&removed).unwrap();
    assert!(!file.load_all(), "load_all should fail for a removed file");

    let mut file = EclFile::open(&truncated, OpenFlags::CLOSE_STREAM).unwrap();
    let len = std::fs::metadata(&truncated).unwrap().len();
    let handle = std::fs::OpenOptions::new().write(true).open(&truncated).unwrap();
    handle.set_len(len / 2).unwrap();
    drop(handle);
    assert!(!file.load_all(), "load_all should fail for a truncated file");

    let intact = dir.path().join("INTACT.UNRST");
    write_file(&intact, false, &restart_keywords());
    let mut file = EclFile::open(&intact, OpenFlags::CLOSE_STREAM).unwrap();
    assert!(file.load_all());
    std::fs::remove_file(&intact).unwrap();
    assert_eq!(read_every_keyword(&mut file), restart_keywords());
}

#[test]
fn resized_save_shifts_following_offsets() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("CASE.INIT");
    let mut expected = vec![
        Keyword::new_int("INTEHEAD", vec![1, 2, 3]).unwrap(),
        Keyword::new_float("PORO", vec![0.25; 2500]).unwrap(),
        Keyword::new_char("NAMES", &["A", "B"]).unwrap(),
        Keyword::new_double("DEPTH", vec![1000.0; 40]).unwrap(),
    ];
    write_file(&path, false, &expected);

    let mut file = EclFile::open(&path, OpenFlags::WRITABLE).unwrap();
    let before: Vec<u64> = (0..4).map(|i| file.iget_offset(i).unwrap()).collect();

    let smaller = Keyword::new_float("PORO", vec![0.5; 10]).unwrap();
    file.save_kw(1, smaller.clone()).unwrap();
    expected[1] = smaller;
    let after: Vec<u64> = (0..4).map(|i| file.iget_offset(i).unwrap()).collect();
    assert_eq!(after[..2], before[..2]);
    assert!(after[2] < before[2], "offsets after the resized keyword should move");

    let same_size = Keyword::new_double("DEPTH", vec![2000.0; 40]).unwrap();
    file.save_kw(3, same_size.clone()).unwrap();
    expected[3] = same_size;
    assert_eq!(file.iget_offset(3), Some(after[3]));
    file.close().unwrap();

    let mut reopened = EclFile::open(&path, OpenFlags::DEFAULT).unwrap();
    let reopened_offsets: Vec<u64> = (0..4).map(|i| reopened.iget_offset(i).unwrap()).collect();
    assert_eq!(reopened_offsets, after);
    assert_eq!(read_every_keyword(&mut reopened), expected);
}

#[test]
fn index_file_allows_fast_reopen() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("CASE.UNRST");
    let index = dir.path().join("CASE.UNRST.index");
    write_file(&path, false, &restart_keywords());

    let file = EclFile::open(&path, OpenFlags::DEFAULT).unwrap();
    file.write_index(&index).unwrap();
    file.close().unwrap();

    let mut fast = EclFile::fast_open(&path, &index, OpenFlags::CLOSE_STREAM)
        .unwrap()
        .expect("index is fresh");
    assert_eq!(read_every_keyword(&mut fast), restart_keywords());
}

#[test]
fn active_view_can_be_written_to_a_new_file() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("CASE.UNRST");
    write_file(&path, false, &restart_keywords());
    let mut file = EclFile::open(&path, OpenFlags::DEFAULT).unwrap();
    assert!(file.select_block("SEQNUM", 0));

    let copy = dir.path().join("STEP5.FUNRST");
    file.fwrite(&copy, true).unwrap();
    let mut copied = EclFile::open(&copy, OpenFlags::DEFAULT).unwrap();
    assert_eq!(read_every_keyword(&mut copied), restart_keywords()[..4].to_vec());
}
