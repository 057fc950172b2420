//! Byte level primitives shared by the binary and formatted codecs.
//!
//! # Submodules
//!
//! - [`endian`][]: In-place byte order reversal of element buffers
//! - [`text`][]: Number layouts, token scanning and character encoding for formatted files

pub mod endian;
pub mod text;
