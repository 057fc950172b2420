//! Iterators for sequential access to the keywords of a transport.
//!
//! This module provides a layered iterator design over one open
//! [`Fortio`]:
//!
//! 1. [`Headers`] - Yields each keyword header with its offset, skipping payloads
//! 2. [`Keywords`] - Yields fully decoded keywords
//!
//! Both stop after the first error, which they yield once.
//!
//! # Example
//! ```no_run
//! # use ecl_io::{Fortio, ECL_ENDIAN_FLIP};
//! # use ecl_io::ecl::iter::Headers;
//! let mut fortio = Fortio::open_reader("CASE.UNRST", false, ECL_ENDIAN_FLIP).unwrap();
//! for entry in Headers::new(&mut fortio) {
//!     let entry = entry.unwrap();
//!     println!("{} @ {}", entry.header, entry.offset);
//! }
//! ```

use super::format::fortio::Fortio;
use super::format::index::IndexEntry;
use super::format::keyword;
use super::types::error::Result;
use super::types::keyword::Keyword;

/// Iterator over keyword headers and their offsets.
///
/// Payloads are skipped with their record framing checked, so a truncated
/// payload is reported as an error on the header it belongs to.
pub struct Headers<'a> {
    fortio: &'a mut Fortio,
    done: bool,
}

impl<'a> Headers<'a> {
    pub fn new(fortio: &'a mut Fortio) -> Self {
        Self { fortio, done: false }
    }

    /// Transforms this iterator into one that decodes payloads too,
    /// continuing from the current position.
    pub fn with_data(self) -> Keywords<'a> {
        Keywords {
            fortio: self.fortio,
            done: self.done,
        }
    }

    fn read_next(&mut self) -> Result<Option<IndexEntry>> {
        let offset = self.fortio.ftell()?;
        let Some(header) = keyword::read_header(self.fortio)? else {
            return Ok(None);
        };
        keyword::skip_data(self.fortio, &header)?;
        Ok(Some(IndexEntry { header, offset }))
    }
}

impl Iterator for Headers<'_> {
    type Item = Result<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read_next().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Iterator over fully decoded keywords.
///
/// Created by [`Keywords::new`] or [`Headers::with_data()`].
pub struct Keywords<'a> {
    fortio: &'a mut Fortio,
    done: bool,
}

impl<'a> Keywords<'a> {
    pub fn new(fortio: &'a mut Fortio) -> Self {
        Self { fortio, done: false }
    }
}

impl Iterator for Keywords<'_> {
    type Item = Result<Keyword>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = keyword::read_keyword(self.fortio).transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecl::types::models::ECL_ENDIAN_FLIP;
    use tempfile::TempDir;

    #[test]
    fn headers_then_keywords() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iter.INIT");
        let mut fortio = Fortio::open_writer(&path, false, ECL_ENDIAN_FLIP).unwrap();
        for (name, n) in [("PORO", 3), ("PERMX", 4), ("NTG", 5)] {
            let kw = Keyword::new_float(name, vec![0.25; n]).unwrap();
            keyword::write_keyword(&mut fortio, &kw).unwrap();
        }
        fortio.close().unwrap();

        let mut fortio = Fortio::open_reader(&path, false, ECL_ENDIAN_FLIP).unwrap();
        let mut headers = Headers::new(&mut fortio);
        let first = headers.next().unwrap().unwrap();
        assert_eq!(first.header.name, "PORO");
        assert_eq!(first.offset, 0);

        let rest: Vec<Keyword> = headers.with_data().map(|kw| kw.unwrap()).collect();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].name(), "PERMX");
        assert_eq!(rest[1].as_floats().unwrap(), &[0.25; 5]);
    }

    #[test]
    fn iteration_stops_after_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.INIT");
        let mut fortio = Fortio::open_writer(&path, false, ECL_ENDIAN_FLIP).unwrap();
        let kw = Keyword::new_int("SATNUM", vec![1; 10]).unwrap();
        keyword::write_keyword(&mut fortio, &kw).unwrap();
        keyword::write_keyword(&mut fortio, &kw).unwrap();
        fortio.close().unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 3);
        std::fs::write(&path, &bytes).unwrap();

        let mut fortio = Fortio::open_reader(&path, false, ECL_ENDIAN_FLIP).unwrap();
        let items: Vec<Result<Keyword>> = Keywords::new(&mut fortio).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
