//! Grids and the geometry derived from them.
//!
//! # Submodules
//!
//! - [`corner_point`]: The realized corner point grid with its LGRs and NNC links
//! - [`egrid`]: Loading and writing grids as EGRID keyword files
//! - [`dims`]: Dimension sniffing without building a grid
//! - [`cache`]: Active cell positions with lazily computed volumes
//! - [`nnc`]: Sorted non-neighbour connection pairs and attached data

pub mod cache;
pub mod corner_point;
pub mod dims;
pub mod egrid;
pub mod nnc;

use super::file::EclFile;
use super::types::error::{EclError, Result};
use super::view::FileView;

pub const FILEHEAD_KW: &str = "FILEHEAD";
pub const GRIDUNIT_KW: &str = "GRIDUNIT";
pub const GRIDHEAD_KW: &str = "GRIDHEAD";
pub const DIMENS_KW: &str = "DIMENS";
pub const COORD_KW: &str = "COORD";
pub const ZCORN_KW: &str = "ZCORN";
pub const ACTNUM_KW: &str = "ACTNUM";
pub const HOSTNUM_KW: &str = "HOSTNUM";
pub const ENDGRID_KW: &str = "ENDGRID";
pub const LGR_KW: &str = "LGR";
pub const LGR_PARENT_KW: &str = "LGRPARNT";
pub const ENDLGR_KW: &str = "ENDLGR";
pub const NNCHEAD_KW: &str = "NNCHEAD";
pub const NNC1_KW: &str = "NNC1";
pub const NNC2_KW: &str = "NNC2";
pub const NNCL_KW: &str = "NNCL";
pub const NNCG_KW: &str = "NNCG";
pub const NNCHEADA_KW: &str = "NNCHEADA";
pub const NNA1_KW: &str = "NNA1";
pub const NNA2_KW: &str = "NNA2";
pub const INTEHEAD_KW: &str = "INTEHEAD";

pub const FILEHEAD_SIZE: usize = 100;
pub const FILEHEAD_VERSION_INDEX: usize = 0;
pub const GRIDHEAD_SIZE: usize = 100;
pub const GRIDHEAD_TYPE_INDEX: usize = 0;
pub const GRIDHEAD_NX_INDEX: usize = 1;
pub const GRIDHEAD_NY_INDEX: usize = 2;
pub const GRIDHEAD_NZ_INDEX: usize = 3;
pub const GRIDHEAD_LGR_INDEX: usize = 4;
pub const GRIDHEAD_NUMRES_INDEX: usize = 24;
/// `GRIDHEAD` type of corner point grids.
pub const GRIDHEAD_GRIDTYPE_CORNERPOINT: i32 = 1;
pub const DIMENS_NX_INDEX: usize = 0;
pub const DIMENS_NY_INDEX: usize = 1;
pub const DIMENS_NZ_INDEX: usize = 2;
pub const INTEHEAD_NACTIVE_INDEX: usize = 11;
pub const NNCHEAD_SIZE: usize = 10;
pub const NNCHEAD_NUMNNC_INDEX: usize = 0;
pub const NNCHEAD_LGR_INDEX: usize = 1;
pub const NNCHEADA_SIZE: usize = 10;
pub const NNCHEADA_ILOC1_INDEX: usize = 0;
pub const NNCHEADA_ILOC2_INDEX: usize = 1;

/// Integer payload of the `occurrence`th `name` in `view`.
pub(crate) fn view_ints(
    file: &mut EclFile,
    view: &FileView,
    name: &str,
    occurrence: usize,
) -> Result<Option<Vec<i32>>> {
    let Some(index) = view.iget_named(name, occurrence) else {
        return Ok(None);
    };
    match file.view_kw(view, index)? {
        Some(kw) => kw
            .as_ints()
            .map(|v| Some(v.to_vec()))
            .ok_or_else(|| kw.type_mismatch("INTE")),
        None => Ok(None),
    }
}

/// Float payload of the `occurrence`th `name` in `view`. Double
/// payloads are narrowed.
pub(crate) fn view_floats(
    file: &mut EclFile,
    view: &FileView,
    name: &str,
    occurrence: usize,
) -> Result<Option<Vec<f32>>> {
    let Some(index) = view.iget_named(name, occurrence) else {
        return Ok(None);
    };
    match file.view_kw(view, index)? {
        Some(kw) => match (kw.as_floats(), kw.as_doubles()) {
            (Some(v), _) => Ok(Some(v.to_vec())),
            (None, Some(v)) => Ok(Some(v.iter().map(|&x| x as f32).collect())),
            _ => Err(kw.type_mismatch("REAL")),
        },
        None => Ok(None),
    }
}

/// First string of the `occurrence`th `name` in `view`.
pub(crate) fn view_string(
    file: &mut EclFile,
    view: &FileView,
    name: &str,
    occurrence: usize,
) -> Result<Option<String>> {
    let Some(index) = view.iget_named(name, occurrence) else {
        return Ok(None);
    };
    match file.view_kw(view, index)? {
        Some(kw) => kw
            .as_strings()
            .map(|v| Some(v.first().cloned().unwrap_or_default()))
            .ok_or_else(|| kw.type_mismatch("CHAR")),
        None => Ok(None),
    }
}

/// Element `index` of a header array as a count or cell number.
pub(crate) fn header_value(head: &[i32], name: &str, index: usize) -> Result<usize> {
    let value = *head.get(index).ok_or_else(|| {
        EclError::InvalidFormat(format!("{} has no element {}", name, index))
    })?;
    usize::try_from(value)
        .map_err(|_| EclError::InvalidFormat(format!("{}[{}] is negative: {}", name, index, value)))
}
