//! Hierarchical spatial summaries of weighted 2D points.
//!
//! This crate aggregates weighted points into per-cell sums of position and
//! weight (plus point counts) at every level of a quadrant subdivision of a
//! bounding box. Two engines solve the same problem with different designs:
//!
//! - [`PyramidReducer`]: a complete, statically-sized quaternary tree. Points are
//!   scattered into the finest grid with atomic adds, then every coarser level is
//!   reduced from its children, one level per dispatch.
//! - [`QuadtreeBuilder`]: an adaptive quadtree grown only where points fall.
//!   Points are inserted concurrently; nodes are claimed and split under a
//!   per-node spin lock and children come from an atomically bumped [`Arena`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Caller (driver)                        │
//! │   (max_depth, bbox, points) ──▶ Engine::run / run_repeated  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │        PyramidReducer        │  │       QuadtreeBuilder        │
//! │  ┌────────┐   ┌───────────┐  │  │  ┌────────┐   ┌───────────┐  │
//! │  │Scatter │──▶│ Reduce l  │  │  │  │ Insert │──▶│  Readout  │  │
//! │  │(atomic)│   │ (barrier) │  │  │  │ (locks)│   │           │  │
//! │  └────────┘   └───────────┘  │  │  └────────┘   └───────────┘  │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   WorkerPool (fixed-size rayon pool) + Timeline of events   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quadrant convention
//!
//! Quadrant `0` is lower-left, `1` lower-right, `2` upper-left and `3`
//! upper-right. Coordinates on a midpoint go to the upper/right side.
//! Pyramid levels are row-major with row `0` at the bottom of the box.

pub mod addressing;
pub mod arena;
mod atomic;
mod config;
mod engine;
mod error;
mod node;
mod pool;
mod pyramid;
mod quadtree;
mod timing;

pub use arena::{Arena, ArenaSlot};
pub use atomic::AtomicF32;
pub use config::{EngineConfig, Repetition, NODE_CAPACITY_ENV, THREADS_ENV};
pub use engine::{Engine, RunOutput, Workload, MAX_SUPPORTED_DEPTH};
pub use error::QuadsumError;
pub use node::{NodeKind, NodePool, NodeSnapshot};
pub use pool::WorkerPool;
pub use pyramid::{OrderedLevels, PyramidReducer};
pub use quadtree::QuadtreeBuilder;
pub use timing::{Phase, Timeline, TimingEvent, TimingSummary};

use serde::{Deserialize, Serialize};

/// Result type for summary operations.
pub type Result<T> = std::result::Result<T, QuadsumError>;

/// A weighted point in the plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    /// Weight (mass or intensity) contributed by this point.
    pub w: f32,
}

impl Point {
    pub fn new(x: f32, y: f32, w: f32) -> Self {
        Self { x, y, w }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite()
    }
}

impl From<(f32, f32, f32)> for Point {
    fn from((x, y, w): (f32, f32, f32)) -> Self {
        Self { x, y, w }
    }
}

/// Axis-aligned bounding box of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The unit square `(0, 0)..(1, 1)`.
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Midpoint splitting the box into its four quadrants.
    pub fn midpoint(&self) -> (f32, f32) {
        (
            self.min_x + self.width() * 0.5,
            self.min_y + self.height() * 0.5,
        )
    }

    /// True when the box has finite bounds and a positive area.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::unit()
    }
}

/// Aggregate of a set of points: summed position, summed weight and count.
///
/// This is the value held by every pyramid cell and every quadtree node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PyramidCell {
    pub sum_x: f32,
    pub sum_y: f32,
    pub sum_w: f32,
    pub count: u32,
}

impl PyramidCell {
    pub fn new(sum_x: f32, sum_y: f32, sum_w: f32, count: u32) -> Self {
        Self {
            sum_x,
            sum_y,
            sum_w,
            count,
        }
    }

    /// Aggregate of a single point.
    pub fn from_point(point: &Point) -> Self {
        Self::new(point.x, point.y, point.w, 1)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean position of the aggregated points, if there are any.
    pub fn centroid(&self) -> Option<(f32, f32)> {
        (self.count > 0).then(|| {
            let n = self.count as f32;
            (self.sum_x / n, self.sum_y / n)
        })
    }
}

impl std::ops::Add for PyramidCell {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            sum_x: self.sum_x + rhs.sum_x,
            sum_y: self.sum_y + rhs.sum_y,
            sum_w: self.sum_w + rhs.sum_w,
            count: self.count + rhs.count,
        }
    }
}

impl std::ops::AddAssign for PyramidCell {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for PyramidCell {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, cell| acc + cell)
    }
}

impl<'a> std::iter::Sum<&'a Point> for PyramidCell {
    fn sum<I: Iterator<Item = &'a Point>>(iter: I) -> Self {
        iter.map(PyramidCell::from_point).sum()
    }
}
