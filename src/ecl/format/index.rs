//! Header index of a keyword file.
//!
//! Opening a container walks every keyword header and records where it
//! starts, skipping the payloads. The resulting index can be persisted
//! next to the data file and reloaded as long as it is not stale.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};

use super::fortio::Fortio;
use crate::ecl::codec::text;
use crate::ecl::iter::Headers;
use crate::ecl::types::datatype::{NAME_LENGTH, TYPE_TAG_LENGTH, type_table};
use crate::ecl::types::error::{EclError, Result};
use crate::ecl::types::keyword::KeywordHeader;

const INDEX_MAGIC: &[u8; 8] = b"ECLINDX2";

/// Bytes per persisted entry: name, type tag, element count and offset.
const ENTRY_SIZE: u64 = (NAME_LENGTH + TYPE_TAG_LENGTH) as u64 + 16;

/// One keyword header and the byte offset of its header record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub header: KeywordHeader,
    pub offset: u64,
}

/// Scans all keyword headers from the current position to the end.
///
/// A header or payload that cannot be read ends the scan; everything
/// from that point is treated as trailing garbage and ignored.
pub fn scan(fortio: &mut Fortio) -> Vec<IndexEntry> {
    let path = fortio.path().display().to_string();
    let mut entries = Vec::new();
    for entry in Headers::new(fortio) {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(
                "{}: ignoring everything after keyword {}: {}",
                path,
                entries.len(),
                e
            ),
        }
    }
    debug!("Indexed {} keywords in {}", entries.len(), path);
    entries
}

fn source_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Writes `entries` as the index of `source` to `index_path`.
pub fn write_index(index_path: &Path, source: &Path, entries: &[IndexEntry]) -> Result<()> {
    info!("Writing index of {} to {}", source.display(), index_path.display());
    let mut out = BufWriter::new(File::create(index_path)?);
    out.write_all(INDEX_MAGIC)?;
    let name = source_name(source);
    out.write_u32::<BigEndian>(name.len() as u32)?;
    out.write_all(name.as_bytes())?;
    out.write_u64::<BigEndian>(std::fs::metadata(source)?.len())?;
    out.write_u64::<BigEndian>(entries.len() as u64)?;
    for entry in entries {
        out.write_all(&text::encode_text(&entry.header.name, NAME_LENGTH)?)?;
        out.write_all(&text::encode_text(&entry.header.data_type.tag(), TYPE_TAG_LENGTH)?)?;
        out.write_u64::<BigEndian>(entry.header.count as u64)?;
        out.write_u64::<BigEndian>(entry.offset)?;
    }
    out.flush()?;
    Ok(())
}

/// Loads the index of `source` from `index_path`.
///
/// Returns `Ok(None)` if the index is older than the data file, was
/// written for a different file, or records a different data file length.
///
/// # Errors
/// Returns an error if either file cannot be inspected or the index is
/// malformed.
pub fn read_index(index_path: &Path, source: &Path) -> Result<Option<Vec<IndexEntry>>> {
    let index_meta = std::fs::metadata(index_path)?;
    let source_meta = std::fs::metadata(source)?;
    if index_meta.modified()? < source_meta.modified()? {
        debug!("Index {} is older than its data file", index_path.display());
        return Ok(None);
    }
    let malformed = |what: &str| {
        EclError::InvalidFormat(format!("{}: {}", index_path.display(), what))
    };

    let mut input = BufReader::new(File::open(index_path)?);
    let mut magic = [0u8; 8];
    input.read_exact(&mut magic)?;
    if &magic != INDEX_MAGIC {
        return Err(malformed("not a keyword index"));
    }
    let mut remaining = index_meta.len().saturating_sub(INDEX_MAGIC.len() as u64);

    let name_len = input.read_u32::<BigEndian>()? as u64;
    remaining = remaining.saturating_sub(4);
    if name_len > remaining {
        return Err(malformed("file name runs past the end of the index"));
    }
    let mut name = vec![0u8; name_len as usize];
    input.read_exact(&mut name)?;
    remaining -= name_len;
    if String::from_utf8_lossy(&name) != source_name(source) {
        debug!("Index {} belongs to another file", index_path.display());
        return Ok(None);
    }

    let source_len = input.read_u64::<BigEndian>()?;
    if source_len != source_meta.len() {
        debug!(
            "Index {} was written for {} bytes, data file has {}",
            index_path.display(),
            source_len,
            source_meta.len()
        );
        return Ok(None);
    }

    let count = input.read_u64::<BigEndian>()?;
    remaining = remaining.saturating_sub(16);
    if count > remaining / ENTRY_SIZE {
        return Err(malformed(&format!(
            "{} entries do not fit in {} bytes",
            count, remaining
        )));
    }
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut name = [0u8; NAME_LENGTH];
        let mut tag = [0u8; TYPE_TAG_LENGTH];
        input.read_exact(&mut name)?;
        input.read_exact(&mut tag)?;
        let data_type = type_table().from_tag(&String::from_utf8_lossy(&tag))?;
        let elements = input.read_u64::<BigEndian>()? as usize;
        let offset = input.read_u64::<BigEndian>()?;
        entries.push(IndexEntry {
            header: KeywordHeader::new(text::decode_text(&name), elements, data_type),
            offset,
        });
    }
    Ok(Some(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecl::format::keyword;
    use crate::ecl::types::datatype::DataType;
    use crate::ecl::types::keyword::Keyword;
    use crate::ecl::types::models::ECL_ENDIAN_FLIP;
    use tempfile::TempDir;

    #[test]
    fn scan_stops_at_trailing_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.INIT");
        let mut fortio = Fortio::open_writer(&path, false, ECL_ENDIAN_FLIP).unwrap();
        keyword::write_keyword(&mut fortio, &Keyword::new_int("A", vec![1, 2]).unwrap()).unwrap();
        keyword::write_keyword(&mut fortio, &Keyword::new_float("B", vec![1.0; 10]).unwrap())
            .unwrap();
        fortio.close().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 6);
        std::fs::write(&path, &bytes).unwrap();

        let mut fortio = Fortio::open_reader(&path, false, ECL_ENDIAN_FLIP).unwrap();
        let entries = scan(&mut fortio);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].header, KeywordHeader::new("A", 2, DataType::Int));
        assert_eq!(entries[0].offset, 0);
    }

    #[test]
    fn index_file_round_trip_and_name_check() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("CASE.INIT");
        std::fs::write(&source, b"").unwrap();
        let entries = vec![
            IndexEntry {
                header: KeywordHeader::new("INTEHEAD", 95, DataType::Int),
                offset: 0,
            },
            IndexEntry {
                header: KeywordHeader::new("NAMES", 2, DataType::String(12)),
                offset: 432,
            },
        ];
        let index_path = dir.path().join("CASE.INIT.index");
        write_index(&index_path, &source, &entries).unwrap();
        assert_eq!(read_index(&index_path, &source).unwrap(), Some(entries));

        let other = dir.path().join("OTHER.INIT");
        std::fs::write(&other, b"").unwrap();
        let index_time = std::fs::metadata(&index_path).unwrap().modified().unwrap();
        let other_time = std::fs::metadata(&other).unwrap().modified().unwrap();
        if other_time <= index_time {
            assert_eq!(read_index(&index_path, &other).unwrap(), None);
        }
    }

    #[test]
    fn oversized_entry_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("CASE.UNRST");
        std::fs::write(&source, b"").unwrap();
        let index_path = dir.path().join("CASE.UNRST.index");
        write_index(&index_path, &source, &[]).unwrap();

        // overwrite the trailing entry count
        let mut bytes = std::fs::read(&index_path).unwrap();
        let at = bytes.len() - 8;
        bytes[at..].copy_from_slice(&u64::MAX.to_be_bytes());
        std::fs::write(&index_path, &bytes).unwrap();

        match read_index(&index_path, &source) {
            Err(EclError::InvalidFormat(msg)) => assert!(msg.contains("entries"), "{}", msg),
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }

    #[test]
    fn index_of_a_resized_file_is_stale() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("CASE.INIT");
        std::fs::write(&source, vec![0u8; 64]).unwrap();
        let index_path = dir.path().join("CASE.INIT.index");
        let entries = vec![IndexEntry {
            header: KeywordHeader::new("PORO", 10, DataType::Float),
            offset: 0,
        }];
        write_index(&index_path, &source, &entries).unwrap();
        assert_eq!(read_index(&index_path, &source).unwrap(), Some(entries));

        // stale even when both mtimes fall in the same second
        let handle = std::fs::OpenOptions::new().write(true).open(&source).unwrap();
        handle.set_len(32).unwrap();
        drop(handle);
        assert_eq!(read_index(&index_path, &source).unwrap(), None);
    }
}
