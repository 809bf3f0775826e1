//! Grid geometry: flattened indexing, the fixed center cell, and the
//! Manhattan metric used for both routing and approach classification.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

/// A grid coordinate. Differences between positions double as 4-connected
/// direction vectors (unit steps along one axis).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Component-wise signum, reducing any delta to a unit step per axis.
    #[must_use]
    pub const fn signum(self) -> Self {
        Self {
            x: self.x.signum(),
            y: self.y.signum(),
        }
    }
}

impl Add for Pos {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Pos {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Pos {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// The N×N cell grid. Cells are addressed by flattened index `y * N + x`.
/// One cell is the immutable center; it is never selectable and never a
/// patrol target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    size: usize,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl Grid {
    pub const DEFAULT_SIZE: usize = 5;

    /// # Panics
    ///
    /// Panics if `size` is zero. A grid smaller than 1×1 is an internal
    /// invariant violation, not a recoverable configuration error.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size >= 1, "grid must be at least 1x1");
        Self { size }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.size * self.size
    }

    /// Flattened index of the center cell (12 on the 5×5 reference grid).
    #[must_use]
    pub const fn center(&self) -> usize {
        self.cell_count() / 2
    }

    #[must_use]
    pub fn center_pos(&self) -> Pos {
        self.pos_of(self.center())
    }

    /// Maximum number of selectable cells: everything except the center.
    #[must_use]
    pub const fn max_selectable(&self) -> usize {
        self.cell_count() - 1
    }

    #[must_use]
    pub const fn contains_index(&self, index: usize) -> bool {
        index < self.cell_count()
    }

    #[must_use]
    pub fn index_of(&self, pos: Pos) -> usize {
        debug_assert!(pos.x >= 0 && pos.y >= 0);
        pos.y as usize * self.size + pos.x as usize
    }

    #[must_use]
    pub fn pos_of(&self, index: usize) -> Pos {
        Pos::new((index % self.size) as i32, (index / self.size) as i32)
    }

    /// The four corner indices, in reading order.
    #[must_use]
    pub fn corners(&self) -> [usize; 4] {
        let n = self.size;
        [0, n - 1, n * (n - 1), n * n - 1]
    }

    /// Clamp an arbitrary continuous position onto the nearest grid cell.
    #[must_use]
    pub fn snap(&self, x: f32, y: f32) -> Pos {
        let max = (self.size - 1) as i32;
        Pos::new(
            (x.round() as i32).clamp(0, max),
            (y.round() as i32).clamp(0, max),
        )
    }
}

/// How a movement segment relates to the fixed center cell.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Approach {
    /// The destination is strictly closer to the center.
    Toward,
    /// The destination is strictly farther from the center.
    Away,
    /// Distance to the center is unchanged.
    Lateral,
}

/// Classify a segment `from -> to` against the grid's center. This is a pure
/// function of the segment; it does not depend on agent orientation.
#[must_use]
pub fn classify_approach(grid: &Grid, from: Pos, to: Pos) -> Approach {
    let center = grid.center_pos();
    let from_dist = from.manhattan(center);
    let to_dist = to.manhattan(center);
    if to_dist < from_dist {
        Approach::Toward
    } else if to_dist > from_dist {
        Approach::Away
    } else {
        Approach::Lateral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip_covers_grid() {
        let grid = Grid::default();
        for index in 0..grid.cell_count() {
            assert_eq!(grid.index_of(grid.pos_of(index)), index);
        }
    }

    #[test]
    fn center_of_reference_grid_is_twelve() {
        let grid = Grid::default();
        assert_eq!(grid.center(), 12);
        assert_eq!(grid.center_pos(), Pos::new(2, 2));
        assert_eq!(grid.max_selectable(), 24);
    }

    #[test]
    fn corners_in_reading_order() {
        assert_eq!(Grid::default().corners(), [0, 4, 20, 24]);
        assert_eq!(Grid::new(3).corners(), [0, 2, 6, 8]);
    }

    #[test]
    fn snap_clamps_to_grid_bounds() {
        let grid = Grid::default();
        assert_eq!(grid.snap(1.4, 2.6), Pos::new(1, 3));
        assert_eq!(grid.snap(-2.0, 9.0), Pos::new(0, 4));
    }

    #[test]
    fn approach_classification_matches_center_distance() {
        let grid = Grid::default();
        assert_eq!(
            classify_approach(&grid, Pos::new(0, 0), Pos::new(1, 0)),
            Approach::Toward
        );
        assert_eq!(
            classify_approach(&grid, Pos::new(1, 0), Pos::new(0, 0)),
            Approach::Away
        );
        // Both endpoints sit at Manhattan distance 2 from the center.
        assert_eq!(
            classify_approach(&grid, Pos::new(0, 2), Pos::new(1, 3)),
            Approach::Lateral
        );
    }

    #[test]
    #[should_panic(expected = "grid must be at least 1x1")]
    fn zero_sized_grid_is_fatal() {
        let _ = Grid::new(0);
    }
}
