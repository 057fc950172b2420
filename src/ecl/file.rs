//! The keyword container.
//!
//! [`EclFile`] indexes every keyword header of a file on open and decodes
//! payloads on first access. With [`OpenFlags::CLOSE_STREAM`] the OS
//! handle is released after indexing and after every load, so many files
//! can stay indexed while few descriptors are held. With
//! [`OpenFlags::WRITABLE`] keywords can be written back with
//! [`EclFile::save_kw`].

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::format::fortio::{Fortio, FortioMode};
use super::format::index::{self, IndexEntry};
use super::format::keyword;
use super::types::error::{EclError, RecordStatus, Result};
use super::types::keyword::{Keyword, KeywordHeader};
use super::types::models::{ECL_ENDIAN_FLIP, OpenFlags};
use super::utils;
use super::view::FileView;

/// Keyword name that starts each report step block of a restart file.
pub const SEQNUM_KW: &str = "SEQNUM";

#[derive(Debug)]
struct Entry {
    /// Header and offset as currently stored on disk.
    disk: IndexEntry,
    /// Bytes the keyword occupies on disk.
    disk_size: u64,
    /// Header of the keyword as seen through the container.
    header: KeywordHeader,
    keyword: Option<Keyword>,
}

/// An indexed keyword file.
#[derive(Debug)]
pub struct EclFile {
    path: PathBuf,
    flags: OpenFlags,
    fortio: Fortio,
    entries: Vec<Entry>,
    global: FileView,
    active: FileView,
}

impl EclFile {
    /// Opens and indexes a keyword file.
    ///
    /// Formatted or binary is decided from the extension, or from the
    /// content for unknown extensions. Binary files are read with the
    /// platform default byte order handling.
    ///
    /// # Arguments
    /// * `path` - File to open
    /// * `flags` - `CLOSE_STREAM` and/or `WRITABLE`, fixed for the container's lifetime
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be opened, or opened for writing when `WRITABLE` is set
    /// - The file cannot be inspected for its format
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self> {
        let path = path.as_ref();
        let fmt_file = utils::fmt_file(path)?;
        Self::open_with(path, flags, fmt_file, ECL_ENDIAN_FLIP)
    }

    /// Opens and indexes a keyword file with explicit format settings.
    pub fn open_with(
        path: impl AsRef<Path>,
        flags: OpenFlags,
        fmt_file: bool,
        endian_flip: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening keyword file: {}", path.display());
        let mut fortio = Fortio::open(path, Self::mode(flags), fmt_file, endian_flip)?;
        let index = index::scan(&mut fortio);
        Self::from_index(path, flags, fortio, index)
    }

    /// Opens a file using a previously written index instead of scanning.
    ///
    /// Returns `Ok(None)` if the index is stale or belongs to another file.
    pub fn fast_open(
        path: impl AsRef<Path>,
        index_path: impl AsRef<Path>,
        flags: OpenFlags,
    ) -> Result<Option<Self>> {
        let path = path.as_ref();
        let Some(index) = index::read_index(index_path.as_ref(), path)? else {
            return Ok(None);
        };
        info!("Opening keyword file from index: {}", path.display());
        let fmt_file = utils::fmt_file(path)?;
        let fortio = Fortio::open(path, Self::mode(flags), fmt_file, ECL_ENDIAN_FLIP)?;
        Self::from_index(path, flags, fortio, index).map(Some)
    }

    fn mode(flags: OpenFlags) -> FortioMode {
        if flags.contains(OpenFlags::WRITABLE) {
            FortioMode::ReadWrite
        } else {
            FortioMode::Read
        }
    }

    fn from_index(
        path: &Path,
        flags: OpenFlags,
        mut fortio: Fortio,
        index: Vec<IndexEntry>,
    ) -> Result<Self> {
        let file_len = std::fs::metadata(path)?.len();
        let fmt_file = fortio.fmt_file();
        let next_offsets: Vec<u64> = index
            .iter()
            .skip(1)
            .map(|e| e.offset)
            .chain(std::iter::once(file_len))
            .collect();
        let entries: Vec<Entry> = index
            .into_iter()
            .zip(next_offsets)
            .map(|(disk, next)| {
                let disk_size = if fmt_file {
                    next.saturating_sub(disk.offset)
                } else {
                    disk.header.binary_size()
                };
                Entry {
                    header: disk.header.clone(),
                    disk,
                    disk_size,
                    keyword: None,
                }
            })
            .collect();

        let global = FileView::new(
            entries
                .iter()
                .enumerate()
                .map(|(i, e)| (i, e.header.name.as_str())),
        );
        if flags.contains(OpenFlags::CLOSE_STREAM) {
            fortio.fclose_stream()?;
        }
        info!("Indexed {} keywords in {}", entries.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            flags,
            fortio,
            entries,
            active: global.clone(),
            global,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn fmt_file(&self) -> bool {
        self.fortio.fmt_file()
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(OpenFlags::WRITABLE)
    }

    /// True while the OS handle is held.
    pub fn stream_is_open(&self) -> bool {
        self.fortio.stream_is_open()
    }

    // ----- views -----

    /// The view all queries currently go through.
    pub fn active_view(&self) -> &FileView {
        &self.active
    }

    /// Restricts the active view to the `occurrence`th block starting
    /// with `name`. Returns `false` and leaves the view unchanged if
    /// there is no such block.
    pub fn select_block(&mut self, name: &str, occurrence: usize) -> bool {
        match self.global.block(name, occurrence) {
            Some(view) => {
                debug!("Selected block {}[{}] with {} keywords", name, occurrence, view.len());
                self.active = view;
                true
            }
            None => false,
        }
    }

    /// Restores the view of the whole file.
    pub fn select_global(&mut self) {
        self.active = self.global.clone();
    }

    /// Selects the `seqnum_index`th report step block of a restart file.
    pub fn iselect_rstblock(&mut self, seqnum_index: usize) -> bool {
        self.select_block(SEQNUM_KW, seqnum_index)
    }

    /// Selects the restart block whose `SEQNUM` holds `report_step`.
    ///
    /// # Errors
    /// Returns an error if a `SEQNUM` keyword cannot be loaded.
    pub fn select_rstblock_report_step(&mut self, report_step: i32) -> Result<bool> {
        for occurrence in 0..self.global.num_named(SEQNUM_KW) {
            let Some(global) = self.global.iget_named(SEQNUM_KW, occurrence) else {
                break;
            };
            let seqnum = self.load_global(global)?;
            if seqnum.as_ints().and_then(|v| v.first()) == Some(&report_step) {
                return Ok(self.select_block(SEQNUM_KW, occurrence));
            }
        }
        Ok(false)
    }

    /// A detached view of the `occurrence`th block starting with `name`
    /// inside the active view.
    pub fn block_view(&self, name: &str, occurrence: usize) -> Option<FileView> {
        self.active.block(name, occurrence)
    }

    // ----- header queries -----

    /// Number of keywords in the active view.
    pub fn num_kw(&self) -> usize {
        self.active.len()
    }

    pub fn num_named_kw(&self, name: &str) -> usize {
        self.active.num_named(name)
    }

    pub fn has_kw(&self, name: &str) -> bool {
        self.active.has_kw(name)
    }

    pub fn distinct_kw(&self) -> Vec<String> {
        self.active.distinct()
    }

    /// Occurrence number of the keyword at `index` among keywords of the
    /// same name.
    pub fn iget_occurrence(&self, index: usize) -> Option<usize> {
        self.active.occurrence(index)
    }

    pub fn iget_header(&self, index: usize) -> Option<&KeywordHeader> {
        let global = self.active.global_index(index)?;
        Some(&self.entries[global].header)
    }

    pub fn iget_named_header(&self, name: &str, occurrence: usize) -> Option<&KeywordHeader> {
        self.iget_header(self.active.iget_named(name, occurrence)?)
    }

    /// Headers of the active view in file order.
    pub fn headers(&self) -> impl Iterator<Item = &KeywordHeader> + '_ {
        (0..self.active.len()).filter_map(|i| self.iget_header(i))
    }

    // ----- keyword access -----

    /// The keyword at `index` in the active view, decoded on first access.
    ///
    /// Returns `Ok(None)` if `index` is outside the view.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be read back, e.g. because
    /// the file was truncated or removed after indexing.
    pub fn iget_kw(&mut self, index: usize) -> Result<Option<&Keyword>> {
        match self.active.global_index(index) {
            Some(global) => self.load_global(global).map(Some),
            None => Ok(None),
        }
    }

    /// The `occurrence`th keyword called `name` in the active view.
    pub fn iget_named_kw(&mut self, name: &str, occurrence: usize) -> Result<Option<&Keyword>> {
        match self.active.iget_named(name, occurrence) {
            Some(index) => self.iget_kw(index),
            None => Ok(None),
        }
    }

    /// The keyword at `index` of a view obtained from [`EclFile::block_view`].
    pub fn view_kw(&mut self, view: &FileView, index: usize) -> Result<Option<&Keyword>> {
        match view.global_index(index) {
            Some(global) if global < self.entries.len() => self.load_global(global).map(Some),
            _ => Ok(None),
        }
    }

    fn load_global(&mut self, global: usize) -> Result<&Keyword> {
        let keyword = match self.entries[global].keyword.take() {
            Some(keyword) => keyword,
            None => self.read_entry(global)?,
        };
        Ok(self.entries[global].keyword.insert(keyword))
    }

    fn read_entry(&mut self, global: usize) -> Result<Keyword> {
        self.fortio.fopen_stream()?;
        let result = self.read_checked(global);
        self.release_stream()?;
        result
    }

    /// Reads entry `global` from disk; the stream must be open.
    fn read_checked(&mut self, global: usize) -> Result<Keyword> {
        let disk = &self.entries[global].disk;
        let offset = disk.offset;
        debug!("Loading keyword {} from offset {}", disk.header.name, offset);
        self.fortio.fseek(offset)?;
        let keyword = keyword::read_keyword(&mut self.fortio)?
            .ok_or(EclError::record(RecordStatus::Eof, offset))?;
        let disk = &self.entries[global].disk;
        if keyword.header() != disk.header {
            return Err(EclError::InvalidFormat(format!(
                "keyword at offset {} is {}, but was indexed as {}",
                offset,
                keyword.header(),
                disk.header
            )));
        }
        Ok(keyword)
    }

    fn release_stream(&mut self) -> Result<()> {
        if self.flags.contains(OpenFlags::CLOSE_STREAM) {
            self.fortio.fclose_stream()?;
        }
        Ok(())
    }

    /// Decodes every keyword of the file.
    ///
    /// Returns `false` if any payload cannot be read, e.g. because the
    /// file was removed or truncated after indexing. This is an expected
    /// outcome for containers opened with `CLOSE_STREAM`.
    pub fn load_all(&mut self) -> bool {
        if let Err(e) = self.fortio.fopen_stream() {
            warn!("Cannot reopen {}: {}", self.path.display(), e);
            return false;
        }
        let mut ok = true;
        for global in 0..self.entries.len() {
            if self.entries[global].keyword.is_some() {
                continue;
            }
            match self.read_checked(global) {
                Ok(keyword) => self.entries[global].keyword = Some(keyword),
                Err(e) => {
                    warn!(
                        "Failed to load keyword {} of {}: {}",
                        global,
                        self.path.display(),
                        e
                    );
                    ok = false;
                    break;
                }
            }
        }
        if let Err(e) = self.release_stream() {
            warn!("Failed to release {}: {}", self.path.display(), e);
        }
        ok
    }

    /// Replaces the in-memory keyword at `index` without touching disk.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if `index` is outside the active view.
    pub fn replace_kw(&mut self, index: usize, keyword: Keyword) -> Result<()> {
        let global = self.checked_global(index)?;
        self.adopt(index, global, keyword);
        Ok(())
    }

    fn checked_global(&self, index: usize) -> Result<usize> {
        self.active
            .global_index(index)
            .ok_or(EclError::IndexOutOfRange {
                index,
                len: self.active.len(),
            })
    }

    fn adopt(&mut self, index: usize, global: usize, keyword: Keyword) {
        self.global.rename(global, keyword.name());
        self.active.rename(index, keyword.name());
        let entry = &mut self.entries[global];
        entry.header = keyword.header();
        entry.keyword = Some(keyword);
    }

    /// Writes `keyword` to disk in place of the keyword at `index`.
    ///
    /// A keyword of unchanged binary size is overwritten in place.
    /// Otherwise everything after it is rewritten and the offsets of all
    /// following keywords are shifted to match.
    ///
    /// # Panics
    /// Panics if the container was not opened with `OpenFlags::WRITABLE`.
    ///
    /// # Errors
    /// Returns an error if the file can no longer be written.
    pub fn save_kw(&mut self, index: usize, keyword: Keyword) -> Result<()> {
        assert!(
            self.is_writable(),
            "save_kw on {} which was not opened writable",
            self.path.display()
        );
        let global = self.checked_global(index)?;
        self.fortio.fopen_stream()?;
        let result = self.write_entry(global, &keyword);
        self.release_stream()?;
        result?;
        self.adopt(index, global, keyword);
        Ok(())
    }

    fn write_entry(&mut self, global: usize, keyword: &Keyword) -> Result<()> {
        let offset = self.entries[global].disk.offset;
        let old_size = self.entries[global].disk_size;
        let header = keyword.header();

        if !self.fortio.fmt_file() && header.binary_size() == old_size {
            debug!("Saving {} in place at offset {}", header.name, offset);
            self.fortio.fseek(offset)?;
            keyword::write_keyword(&mut self.fortio, keyword)?;
            self.fortio.flush()?;
            self.entries[global].disk.header = header;
            return Ok(());
        }

        let old_end = offset + old_size;
        self.fortio.fseek(old_end)?;
        let mut tail = Vec::new();
        self.fortio.stream()?.read_to_end(&mut tail)?;

        self.fortio.fseek(offset)?;
        keyword::write_keyword(&mut self.fortio, keyword)?;
        let new_end = self.fortio.ftell()?;
        self.fortio.stream()?.write_all(&tail)?;
        self.fortio.ftruncate(new_end + tail.len() as u64)?;
        self.fortio.flush()?;
        debug!(
            "Saved {} with size {} -> {} bytes, rewrote {} trailing bytes",
            header.name,
            old_size,
            new_end - offset,
            tail.len()
        );

        let entry = &mut self.entries[global];
        entry.disk.header = header;
        entry.disk_size = new_end - offset;
        for entry in &mut self.entries[global + 1..] {
            entry.disk.offset = entry.disk.offset + new_end - old_end;
        }
        Ok(())
    }

    /// Byte offset of the keyword at `index` in the active view.
    pub fn iget_offset(&self, index: usize) -> Option<u64> {
        let global = self.active.global_index(index)?;
        Some(self.entries[global].disk.offset)
    }

    // ----- persistence -----

    /// Writes the on-disk header index for later use with [`EclFile::fast_open`].
    pub fn write_index(&self, index_path: impl AsRef<Path>) -> Result<()> {
        let entries: Vec<IndexEntry> = self.entries.iter().map(|e| e.disk.clone()).collect();
        index::write_index(index_path.as_ref(), &self.path, &entries)
    }

    /// Writes every keyword of the active view to a new file.
    pub fn fwrite(&mut self, path: impl AsRef<Path>, fmt_file: bool) -> Result<()> {
        let path = path.as_ref();
        info!("Writing {} keywords to {}", self.active.len(), path.display());
        let mut out = Fortio::open_writer(path, fmt_file, self.fortio.endian_flip())?;
        for index in 0..self.active.len() {
            if let Some(keyword) = self.iget_kw(index)? {
                keyword::write_keyword(&mut out, keyword)?;
            }
        }
        out.close()
    }

    /// Flushes and closes the container.
    pub fn close(self) -> Result<()> {
        self.fortio.close()
    }
}
