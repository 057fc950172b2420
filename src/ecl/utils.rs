//! Small numeric and file helpers

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::types::error::Result;
use super::types::models::{FileKind, FileType};

/// Number of leading bytes inspected when sniffing for formatted content.
const SNIFF_BYTES: usize = 1024;

/// Fraction of text bytes above which content counts as formatted.
const TEXT_FRACTION: f64 = 0.9;

/// Compares two values with an absolute and a relative tolerance.
///
/// Equal values are always equal; otherwise the difference must be below
/// `abs_eps`, or below `rel_eps` relative to the sum of magnitudes.
pub fn approx_equal(d1: f64, d2: f64, rel_eps: f64, abs_eps: f64) -> bool {
    if d1 == d2 {
        return true;
    }
    let diff = (d1 - d2).abs();
    if diff < abs_eps {
        return true;
    }
    let sum = d1.abs() + d2.abs();
    diff / sum < rel_eps
}

/// True if the bytes look like formatted (ASCII) keyword data.
pub fn looks_formatted(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let text = bytes
        .iter()
        .filter(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
        .count();
    text as f64 / bytes.len() as f64 >= TEXT_FRACTION
}

/// Decides whether `path` is a formatted file, from its extension when
/// that is conclusive and from its first kilobyte otherwise.
pub fn fmt_file(path: &Path) -> Result<bool> {
    let kind = FileKind::from_path(path);
    if kind.file_type != FileType::Other {
        return Ok(kind.fmt_file);
    }
    let mut head = Vec::with_capacity(SNIFF_BYTES);
    File::open(path)?
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut head)?;
    Ok(looks_formatted(&head))
}
