//! Corner point grids.
//!
//! A grid of `nx * ny * nz` cells is described by pillars (`COORD`, six
//! floats per pillar: top and bottom xyz) and the depth of each of a
//! cell's eight corners along its four pillars (`ZCORN`). `ACTNUM`
//! marks which cells are active. The main grid owns its local grid
//! refinements (LGRs), numbered from 1 in declaration order.

use std::collections::BTreeMap;

use log::debug;

use super::nnc::NncInfo;
use crate::ecl::types::error::{EclError, Result};

/// The six tetrahedra sharing the diagonal from corner 0 to corner 7.
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];

pub type Point = [f64; 3];

/// A realized corner point grid.
#[derive(Debug, Clone)]
pub struct EclGrid {
    lgr_nr: usize,
    name: String,
    parent_name: Option<String>,
    nx: usize,
    ny: usize,
    nz: usize,
    coord: Vec<f32>,
    zcorn: Vec<f32>,
    actnum: Vec<i32>,
    /// One based host cell in the parent grid, for LGRs.
    hostnum: Vec<i32>,
    active_to_global: Vec<usize>,
    global_to_active: Vec<Option<usize>>,
    nnc: BTreeMap<usize, NncInfo>,
    lgrs: Vec<EclGrid>,
}

impl EclGrid {
    /// Builds a grid from its geometry keywords.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if `coord`, `zcorn` or `actnum` do not match
    /// the dimensions.
    pub fn new(
        nx: usize,
        ny: usize,
        nz: usize,
        coord: Vec<f32>,
        zcorn: Vec<f32>,
        actnum: Option<Vec<i32>>,
    ) -> Result<Self> {
        let size = nx * ny * nz;
        check_len("COORD", 6 * (nx + 1) * (ny + 1), coord.len())?;
        check_len("ZCORN", 8 * size, zcorn.len())?;
        let actnum = actnum.unwrap_or_else(|| vec![1; size]);
        check_len("ACTNUM", size, actnum.len())?;

        let mut grid = Self {
            lgr_nr: 0,
            name: String::new(),
            parent_name: None,
            nx,
            ny,
            nz,
            coord,
            zcorn,
            actnum,
            hostnum: Vec::new(),
            active_to_global: Vec::new(),
            global_to_active: Vec::new(),
            nnc: BTreeMap::new(),
            lgrs: Vec::new(),
        };
        grid.update_index();
        Ok(grid)
    }

    /// A box shaped grid of `dx * dy * dz` cells with its top at depth 0.
    pub fn rectangular(
        nx: usize,
        ny: usize,
        nz: usize,
        dx: f64,
        dy: f64,
        dz: f64,
        actnum: Option<Vec<i32>>,
    ) -> Result<Self> {
        let mut coord = Vec::with_capacity(6 * (nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                let (x, y) = (i as f64 * dx, j as f64 * dy);
                coord.extend_from_slice(&[x, y, 0.0, x, y, nz as f64 * dz].map(|v| v as f32));
            }
        }
        let mut zcorn = vec![0f32; 8 * nx * ny * nz];
        for k in 0..nz {
            for ck in 0..2 {
                let z = ((k + ck) as f64 * dz) as f32;
                let layer = k * 8 * nx * ny + ck * 4 * nx * ny;
                zcorn[layer..layer + 4 * nx * ny].fill(z);
            }
        }
        Self::new(nx, ny, nz, coord, zcorn, actnum)
    }

    fn update_index(&mut self) {
        self.active_to_global.clear();
        self.global_to_active = vec![None; self.actnum.len()];
        for (global, &flag) in self.actnum.iter().enumerate() {
            if flag != 0 {
                self.global_to_active[global] = Some(self.active_to_global.len());
                self.active_to_global.push(global);
            }
        }
    }

    // ----- dimensions and indexing -----

    /// Grid number: 0 for the main grid, 1.. for LGRs.
    pub fn lgr_nr(&self) -> usize {
        self.lgr_nr
    }

    /// LGR name; empty for the main grid.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    pub fn global_size(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn num_active(&self) -> usize {
        self.active_to_global.len()
    }

    pub fn coord(&self) -> &[f32] {
        &self.coord
    }

    pub fn zcorn(&self) -> &[f32] {
        &self.zcorn
    }

    pub fn actnum(&self) -> &[i32] {
        &self.actnum
    }

    pub fn hostnum(&self) -> &[i32] {
        &self.hostnum
    }

    pub fn global_index3(&self, i: usize, j: usize, k: usize) -> usize {
        i + j * self.nx + k * self.nx * self.ny
    }

    pub fn ijk(&self, global: usize) -> (usize, usize, usize) {
        let i = global % self.nx;
        let j = (global / self.nx) % self.ny;
        let k = global / (self.nx * self.ny);
        (i, j, k)
    }

    /// Global index of the `active`th active cell.
    pub fn global_index(&self, active: usize) -> Option<usize> {
        self.active_to_global.get(active).copied()
    }

    /// Active index of a cell, `None` for inactive cells.
    pub fn active_index(&self, global: usize) -> Option<usize> {
        self.global_to_active.get(global).copied().flatten()
    }

    pub fn cell_active(&self, global: usize) -> bool {
        self.active_index(global).is_some()
    }

    // ----- geometry -----

    /// Position of one of the eight corners of a cell.
    ///
    /// Corners are numbered `ck * 4 + cj * 2 + ci`, where the bits select
    /// the upper or lower face along each axis.
    pub fn cell_corner(&self, global: usize, corner: usize) -> Point {
        let (i, j, k) = self.ijk(global);
        let (ci, cj, ck) = (corner & 1, (corner >> 1) & 1, (corner >> 2) & 1);
        let (nx, ny) = (self.nx, self.ny);

        let z_index = k * 8 * nx * ny + ck * 4 * nx * ny + j * 4 * nx + cj * 2 * nx + i * 2 + ci;
        let z = self.zcorn[z_index] as f64;

        let pillar = (j + cj) * (nx + 1) + (i + ci);
        let p = &self.coord[6 * pillar..6 * pillar + 6];
        let (x1, y1, z1) = (p[0] as f64, p[1] as f64, p[2] as f64);
        let (x2, y2, z2) = (p[3] as f64, p[4] as f64, p[5] as f64);
        if z2 == z1 {
            return [x1, y1, z];
        }
        let t = (z - z1) / (z2 - z1);
        [x1 + t * (x2 - x1), y1 + t * (y2 - y1), z]
    }

    pub fn cell_corners(&self, global: usize) -> [Point; 8] {
        std::array::from_fn(|corner| self.cell_corner(global, corner))
    }

    /// Mean of the eight corners.
    pub fn cell_center(&self, global: usize) -> Point {
        let corners = self.cell_corners(global);
        let mut center = [0.0; 3];
        for corner in &corners {
            for axis in 0..3 {
                center[axis] += corner[axis] / 8.0;
            }
        }
        center
    }

    /// Cell volume as the sum of six tetrahedra around the 0-7 diagonal.
    pub fn cell_volume(&self, global: usize) -> f64 {
        let c = self.cell_corners(global);
        TETRAHEDRA
            .iter()
            .map(|t| tetrahedron_volume(c[t[0]], c[t[1]], c[t[2]], c[t[3]]))
            .sum()
    }

    // ----- LGRs -----

    /// Adds a local grid refinement and returns its grid number.
    ///
    /// # Arguments
    /// * `name` - LGR name, at most eight characters
    /// * `lgr` - The refined grid
    /// * `hostnum` - One based host cell in this grid for every LGR cell
    ///
    /// # Errors
    /// Returns `SizeMismatch` if `hostnum` does not cover every LGR cell.
    pub fn add_lgr(&mut self, name: &str, mut lgr: EclGrid, hostnum: Vec<i32>) -> Result<usize> {
        check_len("HOSTNUM", lgr.global_size(), hostnum.len())?;
        let lgr_nr = self.lgrs.len() + 1;
        debug!("Adding LGR {} as grid {}", name, lgr_nr);
        lgr.lgr_nr = lgr_nr;
        lgr.name = name.to_string();
        lgr.parent_name = Some(self.name.clone()).filter(|n| !n.is_empty());
        lgr.hostnum = hostnum;
        self.lgrs.push(lgr);
        Ok(lgr_nr)
    }

    pub(crate) fn set_lgr_identity(&mut self, lgr_nr: usize, name: &str, parent: Option<String>) {
        self.lgr_nr = lgr_nr;
        self.name = name.to_string();
        self.parent_name = parent;
    }

    pub(crate) fn set_hostnum(&mut self, hostnum: Vec<i32>) {
        self.hostnum = hostnum;
    }

    pub(crate) fn push_lgr(&mut self, lgr: EclGrid) {
        self.lgrs.push(lgr);
    }

    pub fn num_lgr(&self) -> usize {
        self.lgrs.len()
    }

    pub fn lgrs(&self) -> &[EclGrid] {
        &self.lgrs
    }

    /// The grid with number `grid_nr`: this grid for 0, an LGR otherwise.
    pub fn grid(&self, grid_nr: usize) -> Option<&EclGrid> {
        if grid_nr == self.lgr_nr {
            return Some(self);
        }
        self.lgrs.iter().find(|g| g.lgr_nr == grid_nr)
    }

    pub fn grid_mut(&mut self, grid_nr: usize) -> Option<&mut EclGrid> {
        if grid_nr == self.lgr_nr {
            return Some(self);
        }
        self.lgrs.iter_mut().find(|g| g.lgr_nr == grid_nr)
    }

    pub fn lgr_by_name(&self, name: &str) -> Option<&EclGrid> {
        self.lgrs.iter().find(|g| g.name == name)
    }

    /// This grid followed by its LGRs, in grid number order.
    pub fn all_grids(&self) -> impl Iterator<Item = &EclGrid> + '_ {
        std::iter::once(self).chain(self.lgrs.iter())
    }

    // ----- non-neighbour connections -----

    fn check_cell(&self, global: usize) -> Result<()> {
        if global >= self.global_size() {
            return Err(EclError::IndexOutOfRange {
                index: global,
                len: self.global_size(),
            });
        }
        Ok(())
    }

    /// Adds a directed link from `cell1` in this grid to `cell2` in grid
    /// `grid_nr2`. `nnc_index` identifies the link among all links between
    /// the two grids and decides its position when written to file.
    pub(crate) fn add_cell_nnc(
        &mut self,
        cell1: usize,
        grid_nr2: usize,
        cell2: usize,
        nnc_index: usize,
    ) -> Result<()> {
        self.check_cell(cell1)?;
        let lgr_nr = self.lgr_nr;
        self.nnc
            .entry(cell1)
            .or_insert_with(|| NncInfo::new(lgr_nr))
            .add_nnc(grid_nr2, cell2, nnc_index);
        Ok(())
    }

    /// Adds a link between two cells of this grid.
    pub fn add_self_nnc(&mut self, cell1: usize, cell2: usize, nnc_index: usize) -> Result<()> {
        self.check_cell(cell2)?;
        self.add_cell_nnc(cell1, self.lgr_nr, cell2, nnc_index)
    }

    /// Adds links `cells1[i] -> cells2[i]` with `nnc_index = i`.
    pub fn add_self_nnc_list(&mut self, cells1: &[usize], cells2: &[usize]) -> Result<()> {
        check_len("NNC cell list", cells1.len(), cells2.len())?;
        for (nnc_index, (&c1, &c2)) in cells1.iter().zip(cells2).enumerate() {
            self.add_self_nnc(c1, c2, nnc_index)?;
        }
        Ok(())
    }

    /// Adds a link between cells of two grids of this grid family.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` for an unknown grid number or cell.
    pub fn add_nnc(
        &mut self,
        grid_nr1: usize,
        cell1: usize,
        grid_nr2: usize,
        cell2: usize,
        nnc_index: usize,
    ) -> Result<()> {
        let num_grids = self.lgrs.len() + 1;
        let target = self.grid(grid_nr2).ok_or(EclError::IndexOutOfRange {
            index: grid_nr2,
            len: num_grids,
        })?;
        target.check_cell(cell2)?;
        self.grid_mut(grid_nr1)
            .ok_or(EclError::IndexOutOfRange {
                index: grid_nr1,
                len: num_grids,
            })?
            .add_cell_nnc(cell1, grid_nr2, cell2, nnc_index)
    }

    /// Links starting in `global`, if any.
    pub fn cell_nnc_info(&self, global: usize) -> Option<&NncInfo> {
        self.nnc.get(&global)
    }

    /// Cells with links, in ascending global index order.
    pub fn nnc_cells(&self) -> impl Iterator<Item = (usize, &NncInfo)> + '_ {
        self.nnc.iter().map(|(&cell, info)| (cell, info))
    }

    /// Total number of links starting in this grid.
    pub fn num_nnc(&self) -> usize {
        self.nnc.values().map(NncInfo::total_size).sum()
    }
}

fn check_len(context: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(EclError::SizeMismatch {
            context,
            expected: expected as u64,
            found: found as u64,
        });
    }
    Ok(())
}

fn tetrahedron_volume(a: Point, b: Point, c: Point, d: Point) -> f64 {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let w = [d[0] - a[0], d[1] - a[1], d[2] - a[2]];
    let det = u[0] * (v[1] * w[2] - v[2] * w[1]) - u[1] * (v[0] * w[2] - v[2] * w[0])
        + u[2] * (v[0] * w[1] - v[1] * w[0]);
    det.abs() / 6.0
}
