//! Fortran record transport.
//!
//! Sequential binary files are a series of records framed as
//! `[i32 length][payload][i32 length]`. [`Fortio`] reads and writes that
//! framing, skips records without materializing them, and can release
//! its OS file handle between accesses while remembering where it was.
//!
//! Formatted files share the same handle type; the text codec reads and
//! writes them through [`Fortio::stream`].

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, NativeEndian, WriteBytesExt};
use log::{debug, trace};

use crate::ecl::types::error::{EclError, RecordStatus, Result};
use crate::ecl::types::models::ECL_ENDIAN_FLIP;

/// Chunk size used when copying record payloads between transports.
const COPY_CHUNK: usize = 64 * 1024;

/// How the underlying file was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FortioMode {
    Read,
    /// Create or truncate.
    Write,
    ReadWrite,
    /// Read-write, positioned at the end.
    Append,
}

impl FortioMode {
    pub fn is_writable(self) -> bool {
        !matches!(self, FortioMode::Read)
    }
}

/// The OS level stream behind an open transport.
#[derive(Debug)]
pub(crate) enum Stream {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
    ReadWrite(File),
}

impl Stream {
    fn file(&self) -> &File {
        match self {
            Stream::Reader(r) => r.get_ref(),
            Stream::Writer(w) => w.get_ref(),
            Stream::ReadWrite(f) => f,
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Reader(r) => r.read(buf),
            Stream::Writer(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream opened write-only",
            )),
            Stream::ReadWrite(f) => f.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Reader(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream opened read-only",
            )),
            Stream::Writer(w) => w.write(buf),
            Stream::ReadWrite(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Reader(_) => Ok(()),
            Stream::Writer(w) => w.flush(),
            Stream::ReadWrite(f) => f.flush(),
        }
    }
}

impl Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Stream::Reader(r) => r.seek(pos),
            Stream::Writer(w) => w.seek(pos),
            Stream::ReadWrite(f) => f.seek(pos),
        }
    }
}

/// Either an open stream, or the position to resume at once reopened.
#[derive(Debug)]
enum Handle {
    Open(Stream),
    Closed { resume_at: u64 },
}

/// A Fortran record transport over one file.
#[derive(Debug)]
pub struct Fortio {
    path: PathBuf,
    mode: FortioMode,
    fmt_file: bool,
    endian_flip: bool,
    handle: Handle,
}

/// Reads until `buf` is full or EOF; returns the number of bytes read.
fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl Fortio {
    /// Opens a transport on `path`.
    ///
    /// # Arguments
    /// * `path` - File to open
    /// * `mode` - Read, write (truncating), read-write or append
    /// * `fmt_file` - True for formatted (ASCII) files
    /// * `endian_flip` - True if multi-byte values must be byte swapped
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened in the given mode.
    pub fn open(
        path: impl AsRef<Path>,
        mode: FortioMode,
        fmt_file: bool,
        endian_flip: bool,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening {:?} transport on {}", mode, path.display());
        let mut stream = Self::open_stream(&path, mode, true)?;
        if mode == FortioMode::Append {
            stream.seek(SeekFrom::End(0))?;
        }
        Ok(Self {
            path,
            mode,
            fmt_file,
            endian_flip,
            handle: Handle::Open(stream),
        })
    }

    pub fn open_reader(path: impl AsRef<Path>, fmt_file: bool, endian_flip: bool) -> Result<Self> {
        Self::open(path, FortioMode::Read, fmt_file, endian_flip)
    }

    pub fn open_writer(path: impl AsRef<Path>, fmt_file: bool, endian_flip: bool) -> Result<Self> {
        Self::open(path, FortioMode::Write, fmt_file, endian_flip)
    }

    pub fn open_readwrite(
        path: impl AsRef<Path>,
        fmt_file: bool,
        endian_flip: bool,
    ) -> Result<Self> {
        Self::open(path, FortioMode::ReadWrite, fmt_file, endian_flip)
    }

    pub fn open_append(path: impl AsRef<Path>, fmt_file: bool, endian_flip: bool) -> Result<Self> {
        Self::open(path, FortioMode::Append, fmt_file, endian_flip)
    }

    /// `first_open` distinguishes creating a file from reacquiring it; a
    /// reopened writer must not truncate what it already wrote.
    fn open_stream(path: &Path, mode: FortioMode, first_open: bool) -> io::Result<Stream> {
        Ok(match mode {
            FortioMode::Read => Stream::Reader(BufReader::new(File::open(path)?)),
            FortioMode::Write => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(first_open)
                    .open(path)?;
                Stream::Writer(BufWriter::new(file))
            }
            FortioMode::ReadWrite | FortioMode::Append => Stream::ReadWrite(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(mode == FortioMode::Append)
                    .truncate(false)
                    .open(path)?,
            ),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FortioMode {
        self.mode
    }

    pub fn fmt_file(&self) -> bool {
        self.fmt_file
    }

    pub fn endian_flip(&self) -> bool {
        self.endian_flip
    }

    pub fn is_writable(&self) -> bool {
        self.mode.is_writable()
    }

    // ----- stream lifecycle -----

    pub fn stream_is_open(&self) -> bool {
        matches!(self.handle, Handle::Open(_))
    }

    /// Flushes and releases the OS handle, keeping the logical position.
    pub fn fclose_stream(&mut self) -> Result<()> {
        if let Handle::Open(stream) = &mut self.handle {
            stream.flush()?;
            let resume_at = stream.stream_position()?;
            trace!("Releasing stream of {} at {}", self.path.display(), resume_at);
            self.handle = Handle::Closed { resume_at };
        }
        Ok(())
    }

    /// Reacquires a released OS handle at the remembered position.
    ///
    /// Returns `Ok(true)` if the stream had to be reopened.
    ///
    /// # Errors
    /// Returns an I/O error if the file can no longer be opened, e.g. after
    /// it has been deleted.
    pub fn fopen_stream(&mut self) -> Result<bool> {
        let Handle::Closed { resume_at } = self.handle else {
            return Ok(false);
        };
        trace!("Reacquiring stream of {} at {}", self.path.display(), resume_at);
        let mut stream = Self::open_stream(&self.path, self.mode, false)?;
        stream.seek(SeekFrom::Start(resume_at))?;
        self.handle = Handle::Open(stream);
        Ok(true)
    }

    /// The open stream.
    ///
    /// # Errors
    /// Returns `StreamClosed` if the handle has been released.
    pub(crate) fn stream(&mut self) -> Result<&mut Stream> {
        match &mut self.handle {
            Handle::Open(stream) => Ok(stream),
            Handle::Closed { .. } => Err(EclError::StreamClosed(self.path.display().to_string())),
        }
    }

    fn assert_writable(&self, operation: &str) {
        assert!(
            self.mode.is_writable(),
            "{} on transport opened read-only: {}",
            operation,
            self.path.display()
        );
    }

    // ----- positioning -----

    pub fn ftell(&mut self) -> Result<u64> {
        match &mut self.handle {
            Handle::Open(stream) => Ok(stream.stream_position()?),
            Handle::Closed { resume_at } => Ok(*resume_at),
        }
    }

    pub fn fseek(&mut self, offset: u64) -> Result<()> {
        match &mut self.handle {
            Handle::Open(stream) => {
                stream.seek(SeekFrom::Start(offset))?;
            }
            Handle::Closed { resume_at } => *resume_at = offset,
        }
        Ok(())
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.fseek(0)
    }

    /// True if the stream is positioned at or beyond the end of the file.
    pub fn read_at_eof(&mut self) -> Result<bool> {
        let stream = self.stream()?;
        let pos = stream.stream_position()?;
        let len = stream.file().metadata()?.len();
        Ok(pos >= len)
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Handle::Open(stream) = &mut self.handle {
            stream.flush()?;
        }
        Ok(())
    }

    /// Truncates the file to `size` bytes and leaves the stream there.
    ///
    /// # Panics
    /// Panics if the transport was opened read-only.
    pub fn ftruncate(&mut self, size: u64) -> Result<()> {
        self.assert_writable("truncate");
        let stream = self.stream()?;
        stream.flush()?;
        stream.file().set_len(size)?;
        stream.seek(SeekFrom::Start(size))?;
        debug!("Truncated {} to {} bytes", self.path.display(), size);
        Ok(())
    }

    /// Flushes and closes the transport.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    // ----- record framing -----

    fn decode_marker(&self, bytes: [u8; 4]) -> i32 {
        let value = NativeEndian::read_i32(&bytes);
        if self.endian_flip { value.swap_bytes() } else { value }
    }

    fn write_marker(&mut self, value: i32) -> Result<()> {
        let value = if self.endian_flip { value.swap_bytes() } else { value };
        self.stream()?.write_i32::<NativeEndian>(value)?;
        Ok(())
    }

    /// Reads the leading length marker of the next record.
    ///
    /// Returns `Ok(None)` on a clean end of file at a record boundary and
    /// the payload length otherwise.
    ///
    /// # Errors
    /// Returns a `Record` error with `MissingData` if the marker is cut
    /// short, and `HeaderMismatch` if it is negative.
    pub fn init_read(&mut self) -> Result<Option<usize>> {
        let offset = self.ftell()?;
        let mut bytes = [0u8; 4];
        let n = read_fully(self.stream()?, &mut bytes)?;
        if n == 0 {
            return Ok(None);
        }
        if n < 4 {
            return Err(EclError::record(RecordStatus::MissingData, offset));
        }
        let len = self.decode_marker(bytes);
        if len < 0 {
            return Err(EclError::record(RecordStatus::HeaderMismatch, offset));
        }
        trace!("Record of {} bytes at offset {}", len, offset);
        Ok(Some(len as usize))
    }

    /// Reads the trailing length marker and checks it against `len`.
    ///
    /// # Errors
    /// `MissingTail` if the marker is absent, `HeaderMismatch` if it differs.
    pub fn complete_read(&mut self, len: usize) -> Result<()> {
        let offset = self.ftell()?;
        let mut bytes = [0u8; 4];
        if read_fully(self.stream()?, &mut bytes)? < 4 {
            return Err(EclError::record(RecordStatus::MissingTail, offset));
        }
        let tail = self.decode_marker(bytes);
        if tail as i64 != len as i64 {
            debug!("Record tail {} does not match header {} at {}", tail, len, offset);
            return Err(EclError::record(RecordStatus::HeaderMismatch, offset));
        }
        Ok(())
    }

    fn read_payload(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.ftell()?;
        if read_fully(self.stream()?, buf)? < buf.len() {
            return Err(EclError::record(RecordStatus::MissingData, offset));
        }
        Ok(())
    }

    /// Reads one complete record; `Ok(None)` at end of file.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(len) = self.init_read()? else {
            return Ok(None);
        };
        let mut payload = vec![0u8; len];
        self.read_payload(&mut payload)?;
        self.complete_read(len)?;
        Ok(Some(payload))
    }

    /// Reads a record whose payload must be exactly `buf.len()` bytes.
    pub fn read_record_into(&mut self, buf: &mut [u8], context: &'static str) -> Result<()> {
        let offset = self.ftell()?;
        let len = self
            .init_read()?
            .ok_or(EclError::record(RecordStatus::Eof, offset))?;
        if len != buf.len() {
            return Err(EclError::SizeMismatch {
                context,
                expected: buf.len() as u64,
                found: len as u64,
            });
        }
        self.read_payload(buf)?;
        self.complete_read(len)
    }

    /// Fills `buf` from as many consecutive records as it takes.
    ///
    /// # Errors
    /// `SizeMismatch` if a record would overrun the buffer.
    pub fn fread_buffer(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let offset = self.ftell()?;
            let len = self
                .init_read()?
                .ok_or(EclError::record(RecordStatus::Eof, offset))?;
            if filled + len > buf.len() {
                return Err(EclError::SizeMismatch {
                    context: "buffer spread over records",
                    expected: (buf.len() - filled) as u64,
                    found: len as u64,
                });
            }
            self.read_payload(&mut buf[filled..filled + len])?;
            self.complete_read(len)?;
            filled += len;
        }
        Ok(())
    }

    /// Skips one record without reading its payload.
    ///
    /// Returns `Ok(false)` on a clean end of file.
    pub fn fskip_record(&mut self) -> Result<bool> {
        let Some(len) = self.init_read()? else {
            return Ok(false);
        };
        self.fskip_buffer(len)?;
        self.complete_read(len)?;
        Ok(true)
    }

    /// Moves forward `n` raw bytes.
    pub fn fskip_buffer(&mut self, n: usize) -> Result<()> {
        self.stream()?.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    /// Skips the blocked payload records of a keyword with `count`
    /// elements, checking every record length on the way.
    pub fn data_fskip(&mut self, element_size: usize, count: usize, block_size: usize) -> Result<()> {
        let mut remaining = count;
        while remaining > 0 {
            let in_block = remaining.min(block_size);
            let offset = self.ftell()?;
            let len = self
                .init_read()?
                .ok_or(EclError::record(RecordStatus::MissingData, offset))?;
            let expected = in_block * element_size;
            if len != expected {
                return Err(EclError::SizeMismatch {
                    context: "keyword data block",
                    expected: expected as u64,
                    found: len as u64,
                });
            }
            self.fskip_buffer(len)?;
            self.complete_read(len)?;
            remaining -= in_block;
        }
        Ok(())
    }

    /// Writes one complete record.
    ///
    /// # Panics
    /// Panics if the transport was opened read-only.
    pub fn fwrite_record(&mut self, payload: &[u8]) -> Result<()> {
        self.assert_writable("record write");
        let len = i32::try_from(payload.len()).map_err(|_| EclError::SizeMismatch {
            context: "record payload",
            expected: i32::MAX as u64,
            found: payload.len() as u64,
        })?;
        self.write_marker(len)?;
        self.stream()?.write_all(payload)?;
        self.write_marker(len)
    }

    /// Copies the next record of `src` to `dst` in bounded chunks.
    ///
    /// Returns `Ok(false)` if `src` is at end of file.
    pub fn copy_record(src: &mut Fortio, dst: &mut Fortio) -> Result<bool> {
        dst.assert_writable("record copy");
        let Some(len) = src.init_read()? else {
            return Ok(false);
        };
        dst.write_marker(len as i32)?;
        let mut chunk = vec![0u8; len.min(COPY_CHUNK)];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(COPY_CHUNK);
            src.read_payload(&mut chunk[..n])?;
            dst.stream()?.write_all(&chunk[..n])?;
            remaining -= n;
        }
        src.complete_read(len)?;
        dst.write_marker(len as i32)?;
        Ok(true)
    }

    /// Checks the framing of the next record without committing to it.
    pub fn check_record(&mut self) -> RecordStatus {
        let mut bytes = [0u8; 4];
        let Ok(stream) = self.stream() else {
            return RecordStatus::NoEntry;
        };
        let n = match read_fully(stream, &mut bytes) {
            Ok(n) => n,
            Err(_) => return RecordStatus::MissingData,
        };
        if n == 0 {
            return RecordStatus::Eof;
        }
        if n < 4 {
            return RecordStatus::MissingData;
        }
        let len = self.decode_marker(bytes);
        if len < 0 {
            return RecordStatus::HeaderMismatch;
        }
        let Ok(stream) = self.stream() else {
            return RecordStatus::NoEntry;
        };
        match io::copy(&mut (&mut *stream).take(len as u64), &mut io::sink()) {
            Ok(copied) if copied == len as u64 => {}
            _ => return RecordStatus::MissingData,
        }
        match read_fully(stream, &mut bytes) {
            Ok(4) => {}
            _ => return RecordStatus::MissingTail,
        }
        if self.decode_marker(bytes) != len {
            return RecordStatus::HeaderMismatch;
        }
        RecordStatus::Ok
    }

    /// Walks every record of a file and reports the first framing fault,
    /// or `Ok` if the whole file is well formed.
    pub fn check_file(path: impl AsRef<Path>, endian_flip: bool) -> RecordStatus {
        let Ok(mut fortio) = Fortio::open_reader(path, false, endian_flip) else {
            return RecordStatus::NoEntry;
        };
        loop {
            match fortio.check_record() {
                RecordStatus::Ok => continue,
                RecordStatus::Eof => return RecordStatus::Ok,
                fault => return fault,
            }
        }
    }

    /// True if the first record of the file is framed correctly.
    pub fn looks_like_fortran_file(path: impl AsRef<Path>, endian_flip: bool) -> bool {
        match Fortio::open_reader(path, false, endian_flip) {
            Ok(mut fortio) => fortio.check_record() == RecordStatus::Ok,
            Err(_) => false,
        }
    }

    /// Decides from the first record whether the file needs byte swapping.
    /// The platform default is tried first.
    pub fn guess_endian_flip(path: impl AsRef<Path>) -> Option<bool> {
        let path = path.as_ref();
        [ECL_ENDIAN_FLIP, !ECL_ENDIAN_FLIP]
            .into_iter()
            .find(|&flip| Self::looks_like_fortran_file(path, flip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_records(path: &Path, records: &[&[u8]]) {
        let mut fortio = Fortio::open_writer(path, false, ECL_ENDIAN_FLIP).unwrap();
        for record in records {
            fortio.fwrite_record(record).unwrap();
        }
        fortio.close().unwrap();
    }

    #[test]
    fn records_are_framed_big_endian() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("framing.bin");
        write_records(&path, &[b"abc"]);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 3, b'a', b'b', b'c', 0, 0, 0, 3]);
    }

    #[test]
    fn skip_and_rewind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skip.bin");
        write_records(&path, &[b"one", b"second", b"3"]);

        let mut fortio = Fortio::open_reader(&path, false, ECL_ENDIAN_FLIP).unwrap();
        assert!(fortio.fskip_record().unwrap());
        assert_eq!(fortio.ftell().unwrap(), 11);
        assert_eq!(fortio.read_record().unwrap().unwrap(), b"second");
        assert!(fortio.fskip_record().unwrap());
        assert!(fortio.read_at_eof().unwrap());
        assert!(!fortio.fskip_record().unwrap());

        fortio.rewind().unwrap();
        assert_eq!(fortio.read_record().unwrap().unwrap(), b"one");
    }

    #[test]
    fn stream_release_keeps_position() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("release.bin");
        write_records(&path, &[b"first", b"second"]);

        let mut fortio = Fortio::open_reader(&path, false, ECL_ENDIAN_FLIP).unwrap();
        fortio.fskip_record().unwrap();
        fortio.fclose_stream().unwrap();
        assert!(!fortio.stream_is_open());
        assert!(matches!(fortio.read_record(), Err(EclError::StreamClosed(_))));
        assert!(fortio.fopen_stream().unwrap());
        assert!(!fortio.fopen_stream().unwrap());
        assert_eq!(fortio.read_record().unwrap().unwrap(), b"second");
    }

    #[test]
    fn check_file_reports_the_fault() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("check.bin");
        write_records(&path, &[b"abcd", b"efgh"]);
        assert_eq!(Fortio::check_file(&path, ECL_ENDIAN_FLIP), RecordStatus::Ok);
        assert!(Fortio::looks_like_fortran_file(&path, ECL_ENDIAN_FLIP));
        assert_eq!(Fortio::guess_endian_flip(&path), Some(ECL_ENDIAN_FLIP));

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 2);
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(
            Fortio::check_file(&path, ECL_ENDIAN_FLIP),
            RecordStatus::MissingTail
        );

        bytes.truncate(14);
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(
            Fortio::check_file(&path, ECL_ENDIAN_FLIP),
            RecordStatus::MissingData
        );

        assert_eq!(
            Fortio::check_file(dir.path().join("missing.bin"), ECL_ENDIAN_FLIP),
            RecordStatus::NoEntry
        );
    }

    #[test]
    fn copy_record_between_transports() {
        let dir = TempDir::new().unwrap();
        let src_path = dir.path().join("src.bin");
        let dst_path = dir.path().join("dst.bin");
        let big = vec![7u8; COPY_CHUNK * 2 + 5];
        write_records(&src_path, &[&big, b"tail"]);

        let mut src = Fortio::open_reader(&src_path, false, ECL_ENDIAN_FLIP).unwrap();
        let mut dst = Fortio::open_writer(&dst_path, false, ECL_ENDIAN_FLIP).unwrap();
        while Fortio::copy_record(&mut src, &mut dst).unwrap() {}
        dst.close().unwrap();

        assert_eq!(
            std::fs::read(&src_path).unwrap(),
            std::fs::read(&dst_path).unwrap()
        );
    }

    #[test]
    fn truncate_cuts_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trunc.bin");
        write_records(&path, &[b"keep", b"drop"]);

        let mut fortio = Fortio::open_readwrite(&path, false, ECL_ENDIAN_FLIP).unwrap();
        fortio.fskip_record().unwrap();
        let end = fortio.ftell().unwrap();
        fortio.ftruncate(end).unwrap();
        fortio.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 12);
    }

    #[test]
    #[should_panic(expected = "read-only")]
    fn writing_through_a_reader_panics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ro.bin");
        write_records(&path, &[b"x"]);
        let mut fortio = Fortio::open_reader(&path, false, ECL_ENDIAN_FLIP).unwrap();
        let _ = fortio.fwrite_record(b"y");
    }
}
