//! Per active cell positions and volumes of one grid.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use super::corner_point::EclGrid;

/// Cell centers of every active cell, indexed by active index.
///
/// Volumes are computed on first request and kept for the lifetime of
/// the cache. The one-time sweep is synchronized, so a cache can be
/// shared between threads.
#[derive(Debug)]
pub struct GridCache<'g> {
    grid: &'g EclGrid,
    global_index: Vec<usize>,
    xpos: Vec<f64>,
    ypos: Vec<f64>,
    zpos: Vec<f64>,
    volume: OnceLock<Vec<f64>>,
    volume_sweeps: AtomicUsize,
}

impl<'g> GridCache<'g> {
    pub fn new(grid: &'g EclGrid) -> Self {
        let size = grid.num_active();
        let mut global_index = Vec::with_capacity(size);
        let mut xpos = Vec::with_capacity(size);
        let mut ypos = Vec::with_capacity(size);
        let mut zpos = Vec::with_capacity(size);
        for global in (0..size).filter_map(|active| grid.global_index(active)) {
            let [x, y, z] = grid.cell_center(global);
            global_index.push(global);
            xpos.push(x);
            ypos.push(y);
            zpos.push(z);
        }
        Self {
            grid,
            global_index,
            xpos,
            ypos,
            zpos,
            volume: OnceLock::new(),
            volume_sweeps: AtomicUsize::new(0),
        }
    }

    pub fn size(&self) -> usize {
        self.global_index.len()
    }

    pub fn global_index(&self) -> &[usize] {
        &self.global_index
    }

    pub fn xpos(&self) -> &[f64] {
        &self.xpos
    }

    pub fn ypos(&self) -> &[f64] {
        &self.ypos
    }

    pub fn zpos(&self) -> &[f64] {
        &self.zpos
    }

    /// True once the volumes have been computed.
    pub fn has_volume(&self) -> bool {
        self.volume.get().is_some()
    }

    pub fn volume(&self) -> &[f64] {
        self.volume.get_or_init(|| {
            self.volume_sweeps.fetch_add(1, Ordering::Relaxed);
            debug!("Computing volumes of {} active cells", self.global_index.len());
            self.global_index
                .iter()
                .map(|&global| self.grid.cell_volume(global))
                .collect()
        })
    }

    /// Number of volume sweeps performed so far; at most one.
    pub fn volume_sweeps(&self) -> usize {
        self.volume_sweeps.load(Ordering::Relaxed)
    }
}
