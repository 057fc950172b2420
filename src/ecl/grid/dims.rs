//! Grid dimensions read from the header keywords only.

use std::path::Path;

use log::{debug, info, warn};

use super::{
    DIMENS_KW, DIMENS_NX_INDEX, DIMENS_NY_INDEX, DIMENS_NZ_INDEX, GRIDHEAD_KW, GRIDHEAD_NX_INDEX,
    GRIDHEAD_NY_INDEX, GRIDHEAD_NZ_INDEX, INTEHEAD_KW, INTEHEAD_NACTIVE_INDEX, header_value,
    view_ints,
};
use crate::ecl::file::EclFile;
use crate::ecl::types::error::{EclError, Result};
use crate::ecl::types::models::OpenFlags;
use crate::ecl::view::FileView;

/// Dimensions of one grid; `nactive` is 0 when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub nactive: usize,
}

impl GridDims {
    pub fn global_size(&self) -> usize {
        self.nx * self.ny * self.nz
    }
}

/// Reads the dimensions of every grid in a GRID or EGRID file, main
/// grid first, without loading any geometry.
///
/// EGRID files (`GRIDHEAD`) list one entry per grid; GRID files
/// (`DIMENS`) give the main grid only. A file with neither keyword
/// yields an empty list. If `data_file` is given, each entry's active
/// cell count is taken from the matching `INTEHEAD` occurrence of that
/// file; entries without one keep 0.
///
/// # Errors
/// Returns an error if a file cannot be read or a header keyword is
/// too short or has the wrong type.
pub fn sniff_dimensions(
    grid_file: impl AsRef<Path>,
    data_file: Option<&Path>,
) -> Result<Vec<GridDims>> {
    let grid_file = grid_file.as_ref();
    info!("Sniffing grid dimensions from {}", grid_file.display());
    let mut file = EclFile::open(grid_file, OpenFlags::CLOSE_STREAM)?;
    let view = file.active_view().clone();

    let first = file
        .headers()
        .map(|h| h.name.as_str())
        .find(|name| *name == GRIDHEAD_KW || *name == DIMENS_KW)
        .map(str::to_string);

    let mut dims = Vec::new();
    match first.as_deref() {
        Some(GRIDHEAD_KW) => {
            for occurrence in 0..view.num_named(GRIDHEAD_KW) {
                let head = required_ints(&mut file, &view, GRIDHEAD_KW, occurrence)?;
                dims.push(GridDims {
                    nx: header_value(&head, GRIDHEAD_KW, GRIDHEAD_NX_INDEX)?,
                    ny: header_value(&head, GRIDHEAD_KW, GRIDHEAD_NY_INDEX)?,
                    nz: header_value(&head, GRIDHEAD_KW, GRIDHEAD_NZ_INDEX)?,
                    nactive: 0,
                });
            }
        }
        Some(_) => {
            let head = required_ints(&mut file, &view, DIMENS_KW, 0)?;
            dims.push(GridDims {
                nx: header_value(&head, DIMENS_KW, DIMENS_NX_INDEX)?,
                ny: header_value(&head, DIMENS_KW, DIMENS_NY_INDEX)?,
                nz: header_value(&head, DIMENS_KW, DIMENS_NZ_INDEX)?,
                nactive: 0,
            });
        }
        None => debug!("{} has neither {} nor {}", grid_file.display(), GRIDHEAD_KW, DIMENS_KW),
    }

    if let Some(data_file) = data_file {
        read_active_counts(data_file, &mut dims)?;
    }
    Ok(dims)
}

fn required_ints(
    file: &mut EclFile,
    view: &FileView,
    name: &str,
    occurrence: usize,
) -> Result<Vec<i32>> {
    view_ints(file, view, name, occurrence)?
        .ok_or_else(|| EclError::InvalidFormat(format!("missing {} occurrence {}", name, occurrence)))
}

fn read_active_counts(data_file: &Path, dims: &mut [GridDims]) -> Result<()> {
    if !data_file.exists() {
        warn!("Data file {} does not exist; active counts left at 0", data_file.display());
        return Ok(());
    }
    let mut file = EclFile::open(data_file, OpenFlags::CLOSE_STREAM)?;
    let view = file.active_view().clone();
    for (occurrence, entry) in dims.iter_mut().enumerate() {
        match view_ints(&mut file, &view, INTEHEAD_KW, occurrence)? {
            Some(head) => entry.nactive = header_value(&head, INTEHEAD_KW, INTEHEAD_NACTIVE_INDEX)?,
            None => warn!(
                "{} has no {} for grid {}",
                data_file.display(),
                INTEHEAD_KW,
                occurrence
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecl::format::fortio::Fortio;
    use crate::ecl::format::keyword;
    use crate::ecl::types::keyword::Keyword;
    use crate::ecl::types::models::ECL_ENDIAN_FLIP;
    use tempfile::TempDir;

    fn write_file(path: &Path, keywords: &[Keyword]) {
        let mut fortio = Fortio::open_writer(path, false, ECL_ENDIAN_FLIP).unwrap();
        for kw in keywords {
            keyword::write_keyword(&mut fortio, kw).unwrap();
        }
        fortio.close().unwrap();
    }

    fn gridhead(nx: i32, ny: i32, nz: i32, lgr: i32) -> Keyword {
        let mut head = vec![0; 100];
        head[0] = 1;
        head[1..5].copy_from_slice(&[nx, ny, nz, lgr]);
        Keyword::new_int(GRIDHEAD_KW, head).unwrap()
    }

    fn intehead(nactive: i32) -> Keyword {
        let mut head = vec![0; 95];
        head[INTEHEAD_NACTIVE_INDEX] = nactive;
        Keyword::new_int(INTEHEAD_KW, head).unwrap()
    }

    #[test]
    fn every_gridhead_is_reported() {
        let dir = TempDir::new().unwrap();
        let grid = dir.path().join("CASE.EGRID");
        write_file(&grid, &[gridhead(4, 5, 6, 0), gridhead(2, 2, 2, 1)]);
        let init = dir.path().join("CASE.INIT");
        write_file(&init, &[intehead(100)]);

        let dims = sniff_dimensions(&grid, Some(&init)).unwrap();
        assert_eq!(
            dims,
            vec![
                GridDims { nx: 4, ny: 5, nz: 6, nactive: 100 },
                GridDims { nx: 2, ny: 2, nz: 2, nactive: 0 },
            ]
        );
    }

    #[test]
    fn neither_header_gives_empty_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CASE.EGRID");
        write_file(&path, &[Keyword::new_int("PORV", vec![1, 2, 3]).unwrap()]);
        assert!(sniff_dimensions(&path, None).unwrap().is_empty());
    }

    #[test]
    fn missing_data_file_keeps_zero_counts() {
        let dir = TempDir::new().unwrap();
        let grid = dir.path().join("CASE.GRID");
        write_file(&grid, &[Keyword::new_int(DIMENS_KW, vec![3, 4, 5]).unwrap()]);
        let missing = dir.path().join("CASE.INIT");
        let dims = sniff_dimensions(&grid, Some(&missing)).unwrap();
        assert_eq!(dims, vec![GridDims { nx: 3, ny: 4, nz: 5, nactive: 0 }]);
        assert_eq!(dims[0].global_size(), 60);
    }
}
