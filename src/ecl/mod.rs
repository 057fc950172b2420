//! Core ECLIPSE keyword file module.
//!
//! # Submodules
//!
//! - [`types`]: Element types, keywords, open flags and the error type
//! - [`codec`]: Byte order and formatted text primitives
//! - [`format`]: Fortran record transport, keyword codec and header index
//! - [`file`]: The lazily loaded keyword container
//! - [`view`]: Name addressable selections of a container
//! - [`iter`]: Sequential header and keyword iterators
//! - [`grid`]: Corner point grids, dimension sniffing and derived geometry

pub mod codec;
pub mod file;
pub mod format;
pub mod grid;
pub mod iter;
pub mod types;
pub mod utils;
pub mod view;

pub use file::EclFile;
pub use types::error::{EclError, RecordStatus, Result};
