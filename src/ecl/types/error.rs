//! Custom error types for the ecl-io crate.

use std::fmt;
use thiserror::Error;

/// Framing state of one Fortran record, as reported by the transport.
///
/// Probe entry points (`Fortio::check_file`, `Fortio::looks_like_fortran_file`)
/// return these values directly; committed read paths wrap the failing
/// states in [`EclError::Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// The file does not exist or could not be opened.
    NoEntry,
    /// Clean end of file exactly at a record boundary.
    Eof,
    /// The record is complete and both length markers agree.
    Ok,
    /// The payload is shorter than the leading length marker claims.
    MissingData,
    /// The payload is present but the trailing length marker is missing.
    MissingTail,
    /// Leading and trailing length markers disagree.
    HeaderMismatch,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordStatus::NoEntry => write!(f, "no such file"),
            RecordStatus::Eof => write!(f, "end of file"),
            RecordStatus::Ok => write!(f, "ok"),
            RecordStatus::MissingData => write!(f, "missing record data"),
            RecordStatus::MissingTail => write!(f, "missing record tail"),
            RecordStatus::HeaderMismatch => write!(f, "record header/tail mismatch"),
        }
    }
}

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum EclError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// A Fortran record could not be read back intact.
    #[error("Broken Fortran record at offset {offset}: {status}")]
    Record { status: RecordStatus, offset: u64 },

    /// The four character type tag of a keyword header is not known.
    #[error("Unknown keyword type tag: '{0}'")]
    UnknownType(String),

    /// A keyword header could not be decoded.
    #[error("Invalid keyword header at offset {offset}: {reason}")]
    InvalidHeader { offset: u64, reason: String },

    /// A buffer, record or payload has an unexpected size.
    #[error("Size mismatch for {context}: expected {expected} bytes, but found {found} bytes")]
    SizeMismatch {
        context: &'static str,
        expected: u64,
        found: u64,
    },

    /// The file is structurally invalid.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A keyword name does not fit in the eight character header field.
    #[error("Keyword name '{0}' is longer than 8 characters")]
    NameTooLong(String),

    /// A string element does not fit in its fixed-width slot.
    #[error("Value '{value}' does not fit in {width} characters")]
    ValueTooLong { value: String, width: usize },

    /// The keyword holds a different element type than requested.
    #[error("Keyword '{name}' has type {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: String,
    },

    /// An element or keyword index is outside the valid range.
    #[error("Index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The underlying stream was released and could not be reacquired.
    #[error("Stream for '{0}' is closed")]
    StreamClosed(String),
}

/// A convenience `Result` type alias using the crate's `EclError` type.
pub type Result<T> = std::result::Result<T, EclError>;

impl EclError {
    /// Shorthand for a framing error at a given byte offset.
    pub(crate) fn record(status: RecordStatus, offset: u64) -> Self {
        EclError::Record { status, offset }
    }

    /// Returns the framing state for record errors.
    pub fn record_status(&self) -> Option<RecordStatus> {
        match self {
            EclError::Record { status, .. } => Some(*status),
            _ => None,
        }
    }
}
