//! Spatial addressing shared by both engines.
//!
//! A box is split at its midpoint into four quadrants numbered
//! `0` lower-left, `1` lower-right, `2` upper-left, `3` upper-right: bit 0
//! selects the right half and bit 1 the upper half. A coordinate equal to the
//! midpoint belongs to the upper/right side.
//!
//! Pyramid levels are flattened row-major (`row` along `y`, `col` along `x`),
//! so the four children of cell `(row, col)` are `(2row + dy, 2col + dx)` and
//! enumerate in the same quadrant order.

use crate::{BoundingBox, Point};

/// Lower-left quadrant.
pub const LOWER_LEFT: usize = 0;
/// Lower-right quadrant.
pub const LOWER_RIGHT: usize = 1;
/// Upper-left quadrant.
pub const UPPER_LEFT: usize = 2;
/// Upper-right quadrant.
pub const UPPER_RIGHT: usize = 3;

/// Quadrant of `bbox` containing `(x, y)`.
#[inline]
pub fn quadrant(bbox: &BoundingBox, x: f32, y: f32) -> usize {
    let (mid_x, mid_y) = bbox.midpoint();
    usize::from(x >= mid_x) | (usize::from(y >= mid_y) << 1)
}

/// Sub-box covered by `quadrant` of `bbox`.
#[inline]
pub fn quadrant_bounds(bbox: &BoundingBox, quadrant: usize) -> BoundingBox {
    let (mid_x, mid_y) = bbox.midpoint();
    let (min_x, max_x) = if quadrant & 1 == 0 {
        (bbox.min_x, mid_x)
    } else {
        (mid_x, bbox.max_x)
    };
    let (min_y, max_y) = if quadrant & 2 == 0 {
        (bbox.min_y, mid_y)
    } else {
        (mid_y, bbox.max_y)
    };
    BoundingBox::new(min_x, min_y, max_x, max_y)
}

/// One descent step: the quadrant holding `point` and that quadrant's box.
#[inline]
pub fn descend(bbox: &BoundingBox, point: &Point) -> (usize, BoundingBox) {
    let q = quadrant(bbox, point.x, point.y);
    (q, quadrant_bounds(bbox, q))
}

/// Side length of the grid at pyramid `level` (`2^level`).
#[inline]
pub fn grid_size(level: u32) -> usize {
    1usize << level
}

/// Number of cells at pyramid `level` (`4^level`).
#[inline]
pub fn level_len(level: u32) -> usize {
    1usize << (2 * level)
}

/// Offset of pyramid `level` in the flat cell array: `(4^level - 1) / 3`.
#[inline]
pub fn level_offset(level: u32) -> usize {
    (level_len(level) - 1) / 3
}

/// Number of cells in a complete quaternary tree of `depth` levels:
/// `(4^depth - 1) / 3`.
#[inline]
pub fn tree_capacity(depth: u32) -> usize {
    level_offset(depth)
}

/// `(row, col)` of the cell at pyramid `level` holding `(x, y)`.
///
/// The cell is found by `level` steps of [`descend`], so it is always the
/// cell the quadtree routes the point through at that depth. Points outside
/// `bbox` end up in the nearest edge cell.
pub fn grid_cell(bbox: &BoundingBox, level: u32, x: f32, y: f32) -> (usize, usize) {
    let mut bounds = *bbox;
    let (mut row, mut col) = (0, 0);
    for _ in 0..level {
        let q = quadrant(&bounds, x, y);
        row = (row << 1) | (q >> 1);
        col = (col << 1) | (q & 1);
        bounds = quadrant_bounds(&bounds, q);
    }
    (row, col)
}

/// Row-major index of the cell at pyramid `level` holding `(x, y)`.
#[inline]
pub fn grid_index(bbox: &BoundingBox, level: u32, x: f32, y: f32) -> usize {
    let (row, col) = grid_cell(bbox, level, x, y);
    row * grid_size(level) + col
}

/// Indices, within the next finer level, of the four children of cell
/// `index` of a level whose grid side is `grid_size`. Returned in quadrant
/// order.
#[inline]
pub fn child_indices(index: usize, grid_size: usize) -> [usize; 4] {
    let (row, col) = (index / grid_size, index % grid_size);
    let child_size = grid_size * 2;
    std::array::from_fn(|q| {
        let child_row = 2 * row + (q >> 1);
        let child_col = 2 * col + (q & 1);
        child_row * child_size + child_col
    })
}
