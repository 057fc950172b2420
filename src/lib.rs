//! # ecl-io
//!
//! Reading and writing of ECLIPSE style keyword files (GRID, EGRID, INIT,
//! restart and summary files) in both the binary Fortran record layout
//! and the formatted ASCII layout.
//!
//! Files are indexed on open and keyword payloads are decoded on first
//! access. Grids can be loaded from EGRID files, and active cell
//! positions, volumes and non-neighbour connections derived from them.
pub mod ecl;

// Re-export the main types for convenience
pub use ecl::{
    EclError, EclFile, RecordStatus, Result,
    format::fortio::{Fortio, FortioMode},
    grid::{
        cache::GridCache,
        corner_point::EclGrid,
        dims::{GridDims, sniff_dimensions},
        nnc::{NncData, NncGeometry, NncPair},
    },
    types::{
        datatype::DataType,
        keyword::{Keyword, KeywordData, KeywordHeader},
        models::{ECL_ENDIAN_FLIP, FileKind, FileType, OpenFlags},
    },
    view::FileView,
};
