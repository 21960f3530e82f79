//! Pyramid reducer: a complete quaternary tree built by scatter and
//! level-synchronous reduction.
//!
//! ## Passes
//!
//! 1. **Clear**: every cell of every level is zeroed.
//! 2. **Scatter**: each point is routed by midpoint descent to its cell of
//!    the finest level and added component-wise with atomic adds.
//! 3. **Reduce**: from the level just above the leaves up to the root, each
//!    cell becomes the sum of its four children. One dispatch per level; a
//!    level starts only after the previous dispatch has returned.
//! 4. **Readout**: the flat cell array is copied into per-level vectors.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::addressing::{child_indices, grid_index, grid_size, level_len, level_offset, tree_capacity};
use crate::atomic::AtomicF32;
use crate::engine::{Engine, Workload};
use crate::timing::{Phase, Timeline};
use crate::{EngineConfig, Point, PyramidCell, Result, WorkerPool};

/// A pyramid cell shared between workers.
#[derive(Debug, Default)]
struct SharedCell {
    sum_x: AtomicF32,
    sum_y: AtomicF32,
    sum_w: AtomicF32,
    count: AtomicU32,
}

impl SharedCell {
    #[inline]
    fn accumulate(&self, point: &Point) {
        self.sum_x.fetch_add(point.x, Ordering::Relaxed);
        self.sum_y.fetch_add(point.y, Ordering::Relaxed);
        self.sum_w.fetch_add(point.w, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn load(&self) -> PyramidCell {
        PyramidCell {
            sum_x: self.sum_x.load(Ordering::Relaxed),
            sum_y: self.sum_y.load(Ordering::Relaxed),
            sum_w: self.sum_w.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn store(&self, cell: PyramidCell) {
        self.sum_x.store(cell.sum_x, Ordering::Relaxed);
        self.sum_y.store(cell.sum_y, Ordering::Relaxed);
        self.sum_w.store(cell.sum_w, Ordering::Relaxed);
        self.count.store(cell.count, Ordering::Relaxed);
    }
}

/// Flat storage of every level, root first.
struct PyramidStorage {
    cells: Vec<SharedCell>,
    depth: u32,
}

impl PyramidStorage {
    fn zeroed(depth: u32) -> Self {
        let cells = (0..tree_capacity(depth)).map(|_| SharedCell::default()).collect();
        Self { cells, depth }
    }

    fn level(&self, level: u32) -> &[SharedCell] {
        let start = level_offset(level);
        &self.cells[start..start + level_len(level)]
    }

    fn scatter(&self, workload: &Workload<'_>) {
        let leaf_level = self.depth - 1;
        let leaves = self.level(leaf_level);
        let bbox = workload.bbox();

        workload.points().par_iter().for_each(|point| {
            leaves[grid_index(bbox, leaf_level, point.x, point.y)].accumulate(point);
        });
    }

    /// Set every cell of `level` to the sum of its children at `level + 1`.
    fn reduce_level(&self, level: u32) {
        let size = grid_size(level);
        let parents = self.level(level);
        let children = self.level(level + 1);

        parents.par_iter().enumerate().for_each(|(index, parent)| {
            let sum = child_indices(index, size)
                .iter()
                .map(|&child| children[child].load())
                .sum();
            parent.store(sum);
        });
    }

    fn read_out(&self) -> OrderedLevels {
        let levels = (0..self.depth)
            .map(|level| self.level(level).iter().map(SharedCell::load).collect())
            .collect();
        OrderedLevels { levels }
    }
}

/// The finished pyramid. `levels[0]` is the root, `levels[depth - 1]` the
/// finest grid; level `l` holds `4^l` cells in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderedLevels {
    levels: Vec<Vec<PyramidCell>>,
}

impl OrderedLevels {
    /// Number of levels.
    pub fn depth(&self) -> u32 {
        self.levels.len() as u32
    }

    /// The single cell of level 0, holding the global sum.
    pub fn root(&self) -> &PyramidCell {
        &self.levels[0][0]
    }

    pub fn level(&self, level: u32) -> Option<&[PyramidCell]> {
        self.levels.get(level as usize).map(Vec::as_slice)
    }

    pub fn levels(&self) -> &[Vec<PyramidCell>] {
        &self.levels
    }

    /// Cell at `(row, col)` of `level`.
    pub fn cell(&self, level: u32, row: usize, col: usize) -> Option<&PyramidCell> {
        let cells = self.level(level)?;
        let size = grid_size(level);
        if row >= size || col >= size {
            return None;
        }
        cells.get(row * size + col)
    }

    /// The four children of cell `index` of `level`, in quadrant order.
    /// `None` for the finest level.
    pub fn children(&self, level: u32, index: usize) -> Option<[&PyramidCell; 4]> {
        let below = self.level(level + 1)?;
        if index >= level_len(level) {
            return None;
        }
        let indices = child_indices(index, grid_size(level));
        Some(indices.map(|child| &below[child]))
    }

    pub fn into_levels(self) -> Vec<Vec<PyramidCell>> {
        self.levels
    }
}

/// Builds [`OrderedLevels`] on a worker pool.
#[derive(Debug, Clone)]
pub struct PyramidReducer {
    pool: Arc<WorkerPool>,
}

impl PyramidReducer {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self::with_pool(WorkerPool::from_config(config)?))
    }

    /// Share an existing pool.
    pub fn with_pool(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }
}

impl Engine for PyramidReducer {
    type Output = OrderedLevels;

    fn name(&self) -> &'static str {
        "pyramid"
    }

    fn build(&self, workload: &Workload<'_>, timeline: &mut Timeline) -> Result<OrderedLevels> {
        let depth = workload.max_depth();

        let storage = self
            .pool
            .run_phase(timeline, Phase::Clear, || PyramidStorage::zeroed(depth));

        self.pool
            .run_phase(timeline, Phase::Scatter, || storage.scatter(workload));
        debug!(
            points = workload.points().len(),
            grid = grid_size(depth - 1),
            "Points scattered"
        );

        for level in (0..depth - 1).rev() {
            self.pool
                .run_phase(timeline, Phase::Reduce { level }, || storage.reduce_level(level));
            debug!(level, cells = level_len(level), "Level reduced");
        }

        let levels = timeline.record(Phase::Readout, || storage.read_out());
        info!(
            depth,
            cells = storage.cells.len(),
            count = levels.root().count,
            "Pyramid built"
        );
        Ok(levels)
    }
}
