//! Non-neighbour connections.
//!
//! Links are stored per cell on the grid they start in ([`NncInfo`]).
//! [`NncGeometry`] flattens the links of a grid family into one list of
//! [`NncPair`]s sorted by `(grid_nr1, grid_nr2, global_index1,
//! global_index2)`, and [`NncData`] attaches one value to each pair.

use log::debug;

use super::corner_point::EclGrid;
use crate::ecl::types::error::{EclError, Result};

/// One directed link from a cell to `global_index` in some grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NncLink {
    pub global_index: usize,
    /// Position of the link in the connection arrays of its grid pair.
    pub nnc_index: usize,
}

/// All links from one cell into one target grid, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NncVector {
    pub lgr_nr: usize,
    pub links: Vec<NncLink>,
}

/// The links starting in one cell, grouped by target grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NncInfo {
    lgr_nr: usize,
    vectors: Vec<NncVector>,
}

impl NncInfo {
    /// Empty link set for a cell of grid `lgr_nr`.
    pub fn new(lgr_nr: usize) -> Self {
        Self {
            lgr_nr,
            vectors: Vec::new(),
        }
    }

    pub fn add_nnc(&mut self, lgr_nr: usize, global_index: usize, nnc_index: usize) {
        let link = NncLink {
            global_index,
            nnc_index,
        };
        match self.vectors.iter_mut().find(|v| v.lgr_nr == lgr_nr) {
            Some(vector) => vector.links.push(link),
            None => self.vectors.push(NncVector {
                lgr_nr,
                links: vec![link],
            }),
        }
    }

    /// Grid number of the cell the links start in.
    pub fn lgr_nr(&self) -> usize {
        self.lgr_nr
    }

    pub fn vectors(&self) -> &[NncVector] {
        &self.vectors
    }

    pub fn vector(&self, lgr_nr: usize) -> Option<&NncVector> {
        self.vectors.iter().find(|v| v.lgr_nr == lgr_nr)
    }

    /// Links within the cell's own grid.
    pub fn self_vector(&self) -> Option<&NncVector> {
        self.vector(self.lgr_nr)
    }

    pub fn total_size(&self) -> usize {
        self.vectors.iter().map(|v| v.links.len()).sum()
    }
}

/// One connection between two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NncPair {
    pub grid_nr1: usize,
    pub global_index1: usize,
    pub grid_nr2: usize,
    pub global_index2: usize,
    /// Position of the connection in the source arrays of its grid pair.
    pub input_index: usize,
}

impl NncPair {
    fn sort_key(&self) -> (usize, usize, usize, usize) {
        (
            self.grid_nr1,
            self.grid_nr2,
            self.global_index1,
            self.global_index2,
        )
    }

    /// True if both pairs connect the same two grids, and so have their
    /// values in the same source keyword.
    pub fn same_kw(&self, other: &NncPair) -> bool {
        self.grid_nr1 == other.grid_nr1 && self.grid_nr2 == other.grid_nr2
    }
}

/// The sorted connection list of a grid family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NncGeometry {
    pairs: Vec<NncPair>,
}

impl NncGeometry {
    /// Collects every link of `grid` and its LGRs that starts in an
    /// active cell, then sorts the list.
    pub fn new(grid: &EclGrid) -> Self {
        let mut pairs = Vec::new();
        for g in grid.all_grids() {
            for (cell, info) in g.nnc_cells() {
                if !g.cell_active(cell) {
                    continue;
                }
                for vector in info.vectors() {
                    pairs.extend(vector.links.iter().map(|link| NncPair {
                        grid_nr1: g.lgr_nr(),
                        global_index1: cell,
                        grid_nr2: vector.lgr_nr,
                        global_index2: link.global_index,
                        input_index: link.nnc_index,
                    }));
                }
            }
        }
        pairs.sort_by_key(NncPair::sort_key);
        debug!("Built NNC geometry with {} connections", pairs.len());
        Self { pairs }
    }

    pub fn size(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iget(&self, index: usize) -> Option<&NncPair> {
        self.pairs.get(index)
    }

    pub fn pairs(&self) -> &[NncPair] {
        &self.pairs
    }

    /// True if pairs `index1` and `index2` draw values from the same
    /// source keyword.
    pub fn same_kw(&self, index1: usize, index2: usize) -> bool {
        match (self.pairs.get(index1), self.pairs.get(index2)) {
            (Some(a), Some(b)) => a.same_kw(b),
            _ => false,
        }
    }

    /// Position of the connection between two cells, by binary search.
    pub fn find(
        &self,
        grid_nr1: usize,
        global_index1: usize,
        grid_nr2: usize,
        global_index2: usize,
    ) -> Option<usize> {
        let key = (grid_nr1, grid_nr2, global_index1, global_index2);
        self.pairs.binary_search_by_key(&key, NncPair::sort_key).ok()
    }
}

/// One value per connection, ordered like the [`NncGeometry`] it was
/// built for.
#[derive(Debug, Clone, PartialEq)]
pub struct NncData {
    values: Vec<f64>,
}

impl NncData {
    /// Wraps values already ordered like `geometry`.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if the lengths differ.
    pub fn new(geometry: &NncGeometry, values: Vec<f64>) -> Result<Self> {
        if values.len() != geometry.size() {
            return Err(EclError::SizeMismatch {
                context: "NNC data",
                expected: geometry.size() as u64,
                found: values.len() as u64,
            });
        }
        Ok(Self { values })
    }

    /// Gathers values from per grid pair source arrays.
    ///
    /// `source(grid_nr1, grid_nr2)` returns the array for one grid pair,
    /// indexed by each connection's input index. It is called once per
    /// run of pairs sharing a grid pair.
    ///
    /// # Errors
    /// Returns `InvalidFormat` if a grid pair has no source array, and
    /// `IndexOutOfRange` if an array is too short.
    pub fn from_source<F>(geometry: &NncGeometry, mut source: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> Option<Vec<f64>>,
    {
        let mut values = Vec::with_capacity(geometry.size());
        let mut current: Option<(NncPair, Vec<f64>)> = None;
        for pair in geometry.pairs() {
            let reuse = current.as_ref().is_some_and(|(first, _)| first.same_kw(pair));
            if !reuse {
                let array = source(pair.grid_nr1, pair.grid_nr2).ok_or_else(|| {
                    EclError::InvalidFormat(format!(
                        "no NNC data for grids {} -> {}",
                        pair.grid_nr1, pair.grid_nr2
                    ))
                })?;
                current = Some((*pair, array));
            }
            if let Some((_, array)) = &current {
                let value = array.get(pair.input_index).ok_or(EclError::IndexOutOfRange {
                    index: pair.input_index,
                    len: array.len(),
                })?;
                values.push(*value);
            }
        }
        Ok(Self { values })
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn iget(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with_nnc() -> EclGrid {
        let mut grid = EclGrid::rectangular(10, 10, 10, 1.0, 1.0, 1.0, None).unwrap();
        grid.add_self_nnc(8, 9, 2).unwrap();
        grid.add_self_nnc(5, 7, 1).unwrap();
        grid.add_self_nnc(5, 6, 0).unwrap();
        grid
    }

    #[test]
    fn pairs_are_sorted() {
        let geometry = NncGeometry::new(&grid_with_nnc());
        let cells: Vec<(usize, usize, usize)> = geometry
            .pairs()
            .iter()
            .map(|p| (p.global_index1, p.global_index2, p.input_index))
            .collect();
        assert_eq!(cells, vec![(5, 6, 0), (5, 7, 1), (8, 9, 2)]);
        assert_eq!(geometry.find(0, 5, 0, 7), Some(1));
        assert_eq!(geometry.find(0, 7, 0, 5), None);
        assert!(geometry.same_kw(0, 2));
    }

    #[test]
    fn links_from_inactive_cells_are_skipped() {
        let mut actnum = vec![1; 8];
        actnum[1] = 0;
        let mut grid = EclGrid::rectangular(2, 2, 2, 1.0, 1.0, 1.0, Some(actnum)).unwrap();
        grid.add_self_nnc_list(&[0, 1], &[7, 6]).unwrap();
        let geometry = NncGeometry::new(&grid);
        assert_eq!(geometry.size(), 1);
        assert_eq!(geometry.iget(0).unwrap().global_index1, 0);
    }

    #[test]
    fn cross_grid_pairs_sort_after_main_grid() {
        let mut grid = grid_with_nnc();
        let lgr = EclGrid::rectangular(2, 2, 2, 0.5, 0.5, 0.5, None).unwrap();
        grid.add_lgr("LGR1", lgr, vec![1; 8]).unwrap();
        grid.add_nnc(0, 3, 1, 0, 0).unwrap();
        grid.grid_mut(1).unwrap().add_self_nnc(0, 7, 0).unwrap();

        let geometry = NncGeometry::new(&grid);
        let grids: Vec<(usize, usize)> = geometry
            .pairs()
            .iter()
            .map(|p| (p.grid_nr1, p.grid_nr2))
            .collect();
        assert_eq!(grids, vec![(0, 0), (0, 0), (0, 0), (0, 1), (1, 1)]);
        assert!(!geometry.same_kw(2, 3));
    }

    #[test]
    fn data_is_gathered_per_grid_pair() {
        let mut grid = grid_with_nnc();
        let lgr = EclGrid::rectangular(2, 2, 2, 0.5, 0.5, 0.5, None).unwrap();
        grid.add_lgr("LGR1", lgr, vec![1; 8]).unwrap();
        grid.add_nnc(0, 3, 1, 0, 0).unwrap();
        let geometry = NncGeometry::new(&grid);

        let mut calls = Vec::new();
        let data = NncData::from_source(&geometry, |g1, g2| {
            calls.push((g1, g2));
            match (g1, g2) {
                (0, 0) => Some(vec![10.0, 11.0, 12.0]),
                (0, 1) => Some(vec![99.0]),
                _ => None,
            }
        })
        .unwrap();
        assert_eq!(calls, vec![(0, 0), (0, 1)]);
        assert_eq!(data.values(), &[10.0, 11.0, 12.0, 99.0]);

        let missing = NncData::from_source(&geometry, |g1, _| (g1 == 0).then(|| vec![1.0]));
        assert!(missing.is_err());
        assert!(NncData::new(&geometry, vec![0.0; 3]).is_err());
        assert_eq!(NncData::new(&geometry, vec![0.0; 4]).unwrap().size(), 4);
    }
}
