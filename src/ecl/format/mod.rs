//! File format layer: record transport, keyword codec and header index.
//!
//! # Module Organization
//!
//! - [`fortio`]: Fortran record framing, stream release and reacquire
//! - [`keyword`]: Binary and formatted keyword headers and payloads
//! - [`index`]: Header scanning and persisted index files
//!
//! # Architecture
//!
//! ```text
//! Binary keyword:
//! ┌──────────────────────────────────────┐
//! │ [16] NAME(8) COUNT(i32) TAG(4) [16]  │ ← keyword::read_header()
//! ├──────────────────────────────────────┤
//! │ [n] block 0 (≤ block_size elems) [n] │ ← keyword::read_data()
//! │ [m] block 1                      [m] │
//! │ ...                                  │
//! └──────────────────────────────────────┘
//! ```

pub mod fortio;
pub mod index;
pub mod keyword;
