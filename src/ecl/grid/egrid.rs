//! Reading and writing grids as EGRID keyword files.
//!
//! Layout of a written file:
//!
//! ```text
//! FILEHEAD GRIDUNIT                                  file header
//! GRIDHEAD COORD ZCORN ACTNUM ENDGRID                main grid
//! NNCHEAD NNC1 NNC2                                  main grid NNCs
//! LGR LGRPARNT GRIDHEAD COORD ZCORN ACTNUM HOSTNUM   one block per LGR
//!   ENDGRID ENDLGR
//! NNCHEAD NNC1 NNC2 NNCL NNCG                        LGR and main->LGR NNCs
//! NNCHEADA NNA1 NNA2                                 one per LGR->LGR pair
//! ```
//!
//! Cell numbers in the NNC arrays are one based. Each link is stored at
//! its `nnc_index` position.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::{debug, info, warn};

use super::corner_point::EclGrid;
use super::*;
use crate::ecl::file::EclFile;
use crate::ecl::format::fortio::Fortio;
use crate::ecl::format::keyword::write_keyword;
use crate::ecl::types::error::{EclError, Result};
use crate::ecl::types::keyword::Keyword;
use crate::ecl::types::models::{ECL_ENDIAN_FLIP, FileKind, OpenFlags};
use crate::ecl::view::FileView;

const FILEHEAD_VERSION: i32 = 3;
const FILEHEAD_RELEASE_YEAR_INDEX: usize = 1;
const FILEHEAD_RELEASE_YEAR: i32 = 2007;
const GRID_UNIT: &str = "METRES";

/// Links as `(cell1, cell2, nnc_index)`, zero based.
type LinkList = Vec<(usize, usize, usize)>;

impl EclGrid {
    /// Loads a grid with its LGRs and NNCs from an EGRID file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, lacks a grid
    /// keyword, or holds links to cells or grids that do not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading grid from {}", path.display());
        let mut file = EclFile::open(path, OpenFlags::DEFAULT)?;
        let global = file.active_view().clone();
        let mut grid = read_grid(&mut file, &global)?;

        for i in 0..global.num_named(LGR_KW) {
            let Some(view) = global.block(LGR_KW, i) else {
                continue;
            };
            let mut lgr = read_grid(&mut file, &view)?;
            let name = view_string(&mut file, &view, LGR_KW, 0)?.unwrap_or_default();
            let parent = view_string(&mut file, &view, LGR_PARENT_KW, 0)?.filter(|p| !p.is_empty());
            let hostnum = view_ints(&mut file, &view, HOSTNUM_KW, 0)?.unwrap_or_default();
            debug!("Read LGR {} with {} cells", name, lgr.global_size());
            lgr.set_lgr_identity(i + 1, &name, parent);
            lgr.set_hostnum(hostnum);
            grid.push_lgr(lgr);
        }

        read_nnc(&mut file, &global, &mut grid)?;
        read_lgr_nnc(&mut file, &global, &mut grid)?;
        Ok(grid)
    }

    /// Writes the grid family to `path`. The extension decides between
    /// the binary and formatted variant.
    ///
    /// # Errors
    /// Returns `InvalidFormat` if an LGR holds a link into the main
    /// grid, which the file layout has no place for.
    pub fn write_egrid(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let lgr_links = self.lgr_links()?;
        let fmt_file = FileKind::from_path(path).fmt_file;
        info!("Writing grid with {} LGRs to {}", self.num_lgr(), path.display());

        let mut fortio = Fortio::open_writer(path, fmt_file, ECL_ENDIAN_FLIP)?;
        let mut filehead = vec![0; FILEHEAD_SIZE];
        filehead[FILEHEAD_VERSION_INDEX] = FILEHEAD_VERSION;
        filehead[FILEHEAD_RELEASE_YEAR_INDEX] = FILEHEAD_RELEASE_YEAR;
        write_keyword(&mut fortio, &Keyword::new_int(FILEHEAD_KW, filehead)?)?;
        write_keyword(&mut fortio, &Keyword::new_char(GRIDUNIT_KW, &[GRID_UNIT, ""])?)?;

        self.write_geometry(&mut fortio)?;
        let self_links = self.self_links();
        write_nnc_head(&mut fortio, NNCHEAD_KW, [self_links.len(), self.lgr_nr()])?;
        write_links(&mut fortio, NNC1_KW, NNC2_KW, &self_links)?;

        for lgr in self.lgrs() {
            write_keyword(&mut fortio, &Keyword::new_char(LGR_KW, &[lgr.name()])?)?;
            let parent = lgr.parent_name().unwrap_or_default();
            write_keyword(&mut fortio, &Keyword::new_char(LGR_PARENT_KW, &[parent])?)?;
            lgr.write_geometry(&mut fortio)?;
            write_keyword(&mut fortio, &Keyword::new_int(ENDLGR_KW, Vec::new())?)?;

            let self_links = lgr.self_links();
            let global_links = self.links_to(lgr.lgr_nr());
            write_nnc_head(&mut fortio, NNCHEAD_KW, [self_links.len(), lgr.lgr_nr()])?;
            write_links(&mut fortio, NNC1_KW, NNC2_KW, &self_links)?;
            write_links(&mut fortio, NNCL_KW, NNCG_KW, &swap(&global_links))?;
        }

        for ((lgr1, lgr2), links) in &lgr_links {
            write_nnc_head(&mut fortio, NNCHEADA_KW, [*lgr1, *lgr2])?;
            write_links(&mut fortio, NNA1_KW, NNA2_KW, links)?;
        }
        fortio.close()
    }

    /// GRIDHEAD through ENDGRID of this grid alone.
    fn write_geometry(&self, fortio: &mut Fortio) -> Result<()> {
        let (nx, ny, nz) = self.dims();
        let mut gridhead = vec![0; GRIDHEAD_SIZE];
        gridhead[GRIDHEAD_TYPE_INDEX] = GRIDHEAD_GRIDTYPE_CORNERPOINT;
        gridhead[GRIDHEAD_NX_INDEX] = to_i32(nx)?;
        gridhead[GRIDHEAD_NY_INDEX] = to_i32(ny)?;
        gridhead[GRIDHEAD_NZ_INDEX] = to_i32(nz)?;
        gridhead[GRIDHEAD_LGR_INDEX] = to_i32(self.lgr_nr())?;
        gridhead[GRIDHEAD_NUMRES_INDEX] = 1;

        write_keyword(fortio, &Keyword::new_int(GRIDHEAD_KW, gridhead)?)?;
        write_keyword(fortio, &Keyword::new_float(COORD_KW, self.coord().to_vec())?)?;
        write_keyword(fortio, &Keyword::new_float(ZCORN_KW, self.zcorn().to_vec())?)?;
        write_keyword(fortio, &Keyword::new_int(ACTNUM_KW, self.actnum().to_vec())?)?;
        if self.lgr_nr() > 0 {
            write_keyword(fortio, &Keyword::new_int(HOSTNUM_KW, self.hostnum().to_vec())?)?;
        }
        write_keyword(fortio, &Keyword::new_int(ENDGRID_KW, Vec::new())?)
    }

    /// Links from this grid into grid `grid_nr`.
    fn links_to(&self, grid_nr: usize) -> LinkList {
        self.nnc_cells()
            .filter_map(|(cell, info)| info.vector(grid_nr).map(|v| (cell, v)))
            .flat_map(|(cell, v)| v.links.iter().map(move |l| (cell, l.global_index, l.nnc_index)))
            .collect()
    }

    fn self_links(&self) -> LinkList {
        self.links_to(self.lgr_nr())
    }

    /// Links between different LGRs, grouped by grid pair.
    fn lgr_links(&self) -> Result<BTreeMap<(usize, usize), LinkList>> {
        let mut groups = BTreeMap::new();
        for lgr in self.lgrs() {
            if lgr.nnc_cells().any(|(_, info)| info.vector(self.lgr_nr()).is_some()) {
                return Err(EclError::InvalidFormat(format!(
                    "LGR {} links into the main grid",
                    lgr.name()
                )));
            }
            let targets: BTreeSet<usize> = lgr
                .nnc_cells()
                .flat_map(|(_, info)| info.vectors().iter().map(|v| v.lgr_nr))
                .filter(|&nr| nr != lgr.lgr_nr())
                .collect();
            for target in targets {
                groups.insert((lgr.lgr_nr(), target), lgr.links_to(target));
            }
        }
        Ok(groups)
    }
}

fn read_grid(file: &mut EclFile, view: &FileView) -> Result<EclGrid> {
    let head = view_ints(file, view, GRIDHEAD_KW, 0)?.ok_or_else(|| missing(GRIDHEAD_KW))?;
    let nx = header_value(&head, GRIDHEAD_KW, GRIDHEAD_NX_INDEX)?;
    let ny = header_value(&head, GRIDHEAD_KW, GRIDHEAD_NY_INDEX)?;
    let nz = header_value(&head, GRIDHEAD_KW, GRIDHEAD_NZ_INDEX)?;
    let coord = view_floats(file, view, COORD_KW, 0)?.ok_or_else(|| missing(COORD_KW))?;
    let zcorn = view_floats(file, view, ZCORN_KW, 0)?.ok_or_else(|| missing(ZCORN_KW))?;
    let actnum = view_ints(file, view, ACTNUM_KW, 0)?;
    EclGrid::new(nx, ny, nz, coord, zcorn, actnum)
}

fn read_nnc(file: &mut EclFile, global: &FileView, grid: &mut EclGrid) -> Result<()> {
    for occurrence in 0..global.num_named(NNCHEAD_KW) {
        let Some(view) = global.block(NNCHEAD_KW, occurrence) else {
            continue;
        };
        let head = view_ints(file, &view, NNCHEAD_KW, 0)?.ok_or_else(|| missing(NNCHEAD_KW))?;
        let lgr_nr = header_value(&head, NNCHEAD_KW, NNCHEAD_LGR_INDEX)?;

        let nnc1 = view_ints(file, &view, NNC1_KW, 0)?;
        let nnc2 = view_ints(file, &view, NNC2_KW, 0)?;
        if let (Some(nnc1), Some(nnc2)) = (nnc1, nnc2) {
            let size = grid.grid(lgr_nr).map(EclGrid::global_size).ok_or_else(|| {
                EclError::InvalidFormat(format!("NNCHEAD names unknown grid {}", lgr_nr))
            })?;
            for (nnc_index, c1, c2) in cell_pairs(&nnc1, &nnc2)? {
                // dual porosity files list fracture cell links after the matrix ones
                if c1 >= size || c2 >= size {
                    warn!(
                        "Grid {}: ignoring NNC entries from {} on, cell {} or {} is beyond {} cells",
                        lgr_nr, nnc_index, c1, c2, size
                    );
                    break;
                }
                grid.add_nnc(lgr_nr, c1, lgr_nr, c2, nnc_index)?;
            }
        }

        let nncg = view_ints(file, &view, NNCG_KW, 0)?;
        let nncl = view_ints(file, &view, NNCL_KW, 0)?;
        if let (Some(nncg), Some(nncl)) = (nncg, nncl) {
            for (nnc_index, host, local) in cell_pairs(&nncg, &nncl)? {
                grid.add_nnc(0, host, lgr_nr, local, nnc_index)?;
            }
        }
    }
    Ok(())
}

fn read_lgr_nnc(file: &mut EclFile, global: &FileView, grid: &mut EclGrid) -> Result<()> {
    for occurrence in 0..global.num_named(NNCHEADA_KW) {
        let Some(view) = global.block(NNCHEADA_KW, occurrence) else {
            continue;
        };
        let head = view_ints(file, &view, NNCHEADA_KW, 0)?.ok_or_else(|| missing(NNCHEADA_KW))?;
        let lgr1 = header_value(&head, NNCHEADA_KW, NNCHEADA_ILOC1_INDEX)?;
        let lgr2 = header_value(&head, NNCHEADA_KW, NNCHEADA_ILOC2_INDEX)?;
        let nna1 = view_ints(file, &view, NNA1_KW, 0)?.ok_or_else(|| missing(NNA1_KW))?;
        let nna2 = view_ints(file, &view, NNA2_KW, 0)?.ok_or_else(|| missing(NNA2_KW))?;
        for (nnc_index, c1, c2) in cell_pairs(&nna1, &nna2)? {
            grid.add_nnc(lgr1, c1, lgr2, c2, nnc_index)?;
        }
    }
    Ok(())
}

/// Zips two one based cell arrays into `(nnc_index, cell1, cell2)`.
fn cell_pairs(cells1: &[i32], cells2: &[i32]) -> Result<Vec<(usize, usize, usize)>> {
    if cells1.len() != cells2.len() {
        return Err(EclError::SizeMismatch {
            context: "NNC cell arrays",
            expected: cells1.len() as u64,
            found: cells2.len() as u64,
        });
    }
    cells1
        .iter()
        .zip(cells2)
        .enumerate()
        .map(|(i, (&c1, &c2))| Ok((i, zero_based(c1)?, zero_based(c2)?)))
        .collect()
}

fn zero_based(cell: i32) -> Result<usize> {
    usize::try_from(cell)
        .ok()
        .and_then(|c| c.checked_sub(1))
        .ok_or_else(|| EclError::InvalidFormat(format!("invalid NNC cell number {}", cell)))
}

fn swap(links: &LinkList) -> LinkList {
    links.iter().map(|&(c1, c2, i)| (c2, c1, i)).collect()
}

fn write_nnc_head(fortio: &mut Fortio, name: &str, values: [usize; 2]) -> Result<()> {
    let mut head = vec![0; NNCHEAD_SIZE];
    head[0] = to_i32(values[0])?;
    head[1] = to_i32(values[1])?;
    write_keyword(fortio, &Keyword::new_int(name, head)?)
}

/// Writes the two one based cell arrays of `links`, each link at its
/// `nnc_index`. Unused positions hold cell 1.
fn write_links(fortio: &mut Fortio, name1: &str, name2: &str, links: &LinkList) -> Result<()> {
    let len = links.iter().map(|&(_, _, i)| i + 1).max().unwrap_or(0);
    let mut cells1 = vec![1; len];
    let mut cells2 = vec![1; len];
    for &(c1, c2, i) in links {
        cells1[i] = to_i32(c1 + 1)?;
        cells2[i] = to_i32(c2 + 1)?;
    }
    write_keyword(fortio, &Keyword::new_int(name1, cells1)?)?;
    write_keyword(fortio, &Keyword::new_int(name2, cells2)?)
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| EclError::InvalidFormat(format!("{} does not fit an INTE element", value)))
}

fn missing(name: &str) -> EclError {
    EclError::InvalidFormat(format!("missing {} keyword", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecl::grid::nnc::NncGeometry;
    use tempfile::TempDir;

    fn family() -> EclGrid {
        let mut grid = EclGrid::rectangular(3, 3, 2, 10.0, 10.0, 2.0, None).unwrap();
        grid.add_self_nnc_list(&[0, 4], &[17, 13]).unwrap();
        let lgr1 = EclGrid::rectangular(2, 2, 2, 5.0, 5.0, 1.0, None).unwrap();
        let lgr2 = EclGrid::rectangular(2, 2, 1, 5.0, 5.0, 2.0, None).unwrap();
        grid.add_lgr("LGR1", lgr1, vec![5; 8]).unwrap();
        grid.add_lgr("LGR2", lgr2, vec![9; 4]).unwrap();
        grid.add_nnc(0, 3, 1, 0, 0).unwrap();
        grid.add_nnc(0, 5, 1, 1, 1).unwrap();
        grid.add_nnc(1, 7, 2, 2, 0).unwrap();
        grid.grid_mut(2).unwrap().add_self_nnc(0, 3, 0).unwrap();
        grid
    }

    #[test]
    fn grid_family_round_trip() {
        let dir = TempDir::new().unwrap();
        let grid = family();
        for name in ["CASE.EGRID", "CASE.FEGRID"] {
            let path = dir.path().join(name);
            grid.write_egrid(&path).unwrap();
            let loaded = EclGrid::load(&path).unwrap();

            assert_eq!(loaded.dims(), (3, 3, 2));
            assert_eq!(loaded.num_lgr(), 2);
            assert_eq!(loaded.coord(), grid.coord());
            assert_eq!(loaded.zcorn(), grid.zcorn());
            let lgr = loaded.lgr_by_name("LGR2").unwrap();
            assert_eq!(lgr.lgr_nr(), 2);
            assert_eq!(lgr.hostnum(), &[9; 4]);
            assert_eq!(lgr.parent_name(), None);
            assert_eq!(NncGeometry::new(&loaded), NncGeometry::new(&grid), "{}", name);
        }
    }

    #[test]
    fn lgr_to_main_links_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut grid = family();
        grid.add_nnc(1, 0, 0, 0, 5).unwrap();
        let result = grid.write_egrid(dir.path().join("BAD.EGRID"));
        assert!(matches!(result, Err(EclError::InvalidFormat(_))));
    }

    #[test]
    fn fracture_cell_links_end_the_nnc_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("DUALPORO.EGRID");
        let mut grid = EclGrid::rectangular(2, 2, 1, 1.0, 1.0, 1.0, None).unwrap();
        grid.add_self_nnc(0, 2, 0).unwrap();
        grid.write_egrid(&path).unwrap();

        // second pair points at fracture cells 5 and 6 of a 4 cell grid
        let mut file = EclFile::open(&path, OpenFlags::WRITABLE).unwrap();
        for i in 0..file.num_kw() {
            let name = file.iget_kw(i).unwrap().unwrap().name().to_string();
            let values = match name.as_str() {
                NNC1_KW => vec![1, 5, 2],
                NNC2_KW => vec![3, 6, 4],
                _ => continue,
            };
            file.save_kw(i, Keyword::new_int(&name, values).unwrap()).unwrap();
        }
        file.close().unwrap();

        let loaded = EclGrid::load(&path).unwrap();
        assert_eq!(loaded.num_nnc(), 1);
        let targets: Vec<usize> = loaded
            .cell_nnc_info(0)
            .and_then(|info| info.self_vector())
            .map(|v| v.links.iter().map(|l| l.global_index).collect())
            .unwrap_or_default();
        assert_eq!(targets, vec![2]);
        assert!(loaded.cell_nnc_info(1).is_none());
    }

    #[test]
    fn link_arrays_are_one_based_by_nnc_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("NNC.EGRID");
        let mut grid = EclGrid::rectangular(2, 2, 1, 1.0, 1.0, 1.0, None).unwrap();
        grid.add_self_nnc(3, 0, 1).unwrap();
        grid.add_self_nnc(0, 2, 0).unwrap();
        grid.write_egrid(&path).unwrap();

        let mut file = EclFile::open(&path, OpenFlags::DEFAULT).unwrap();
        let nnc1 = file.iget_named_kw(NNC1_KW, 0).unwrap().unwrap().as_ints().unwrap().to_vec();
        let nnc2 = file.iget_named_kw(NNC2_KW, 0).unwrap().unwrap().as_ints().unwrap().to_vec();
        assert_eq!(nnc1, vec![1, 4]);
        assert_eq!(nnc2, vec![3, 1]);
        let head = file.iget_named_kw(NNCHEAD_KW, 0).unwrap().unwrap();
        assert_eq!(head.iget_int(NNCHEAD_NUMNNC_INDEX).unwrap(), 2);
    }
}
