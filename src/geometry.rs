//! # Geometry
//!
//! Integer grid primitives shared by every generation stage.
//!
//! Coordinates grow to the right (`x`) and downward (`y`). A [`Region`] is a
//! half-open rectangle: it covers `x..x + width` and `y..y + height`.

use crate::{FloorplanError, FloorplanResult};
use serde::{Deserialize, Serialize};

/// Represents a cell coordinate on the level grid.
///
/// # Examples
///
/// ```
/// use floorplan::Position;
///
/// let pos = Position::new(10, 5);
/// assert_eq!(pos.x, 10);
/// assert_eq!(pos.y, 5);
/// assert_eq!(pos.cardinal_adjacent_positions().len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Calculates the Manhattan distance to another position.
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan::Position;
    ///
    /// let pos1 = Position::new(0, 0);
    /// let pos2 = Position::new(3, 4);
    /// assert_eq!(pos1.manhattan_distance(pos2), 7);
    /// ```
    pub fn manhattan_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Calculates the Euclidean distance to another position.
    pub fn euclidean_distance(self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Squared Euclidean distance, exact in integers.
    pub fn distance_squared(self, other: Position) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Returns all 8 adjacent positions (including diagonals).
    pub fn adjacent_positions(self) -> [Position; 8] {
        [
            Position::new(self.x, self.y - 1),     // N
            Position::new(self.x + 1, self.y),     // E
            Position::new(self.x, self.y + 1),     // S
            Position::new(self.x - 1, self.y),     // W
            Position::new(self.x + 1, self.y - 1), // NE
            Position::new(self.x + 1, self.y + 1), // SE
            Position::new(self.x - 1, self.y + 1), // SW
            Position::new(self.x - 1, self.y - 1), // NW
        ]
    }

    /// Returns only the 4 cardinal adjacent positions (no diagonals).
    pub fn cardinal_adjacent_positions(self) -> [Position; 4] {
        [
            Position::new(self.x, self.y - 1), // N
            Position::new(self.x + 1, self.y), // E
            Position::new(self.x, self.y + 1), // S
            Position::new(self.x - 1, self.y), // W
        ]
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Axis-aligned integer rectangle.
///
/// Width and height are always positive; use [`Region::new`] or
/// [`Region::try_new`] to build one from untrusted numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Creates a region, or `None` when either dimension is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan::Region;
    ///
    /// assert!(Region::new(0, 0, 100, 100).is_some());
    /// assert!(Region::new(0, 0, 0, 100).is_none());
    /// ```
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { x, y, width, height })
    }

    /// Like [`Region::new`] but reports the offending dimensions as an error.
    pub fn try_new(x: i32, y: i32, width: u32, height: u32) -> FloorplanResult<Self> {
        Self::new(x, y, width, height).ok_or_else(|| {
            FloorplanError::InvalidInput(format!(
                "region at ({x}, {y}) has non-positive size {width}x{height}"
            ))
        })
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Gets the center cell of the region (rounded toward the top-left).
    pub fn center(&self) -> Position {
        Position::new(
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    /// Exact geometric center, used for distance scoring.
    pub fn center_f64(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Checks if a cell is inside this region.
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.x && pos.y >= self.y && pos.x < self.right() && pos.y < self.bottom()
    }

    /// Checks whether `other` lies entirely inside this region.
    pub fn contains_region(&self, other: &Region) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Checks if this region shares at least one cell with another region.
    pub fn intersects(&self, other: &Region) -> bool {
        !(self.x >= other.right()
            || other.x >= self.right()
            || self.y >= other.bottom()
            || other.y >= self.bottom())
    }

    /// Checks if a cell lies on the outermost ring of this region.
    pub fn is_border(&self, pos: Position) -> bool {
        self.contains(pos)
            && (pos.x == self.x
                || pos.y == self.y
                || pos.x == self.right() - 1
                || pos.y == self.bottom() - 1)
    }

    /// Border cells excluding the four corners, in clockwise order from the
    /// top-left. Corridors attach here.
    pub fn boundary_positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();
        let (left, top) = (self.x, self.y);
        let (right, bottom) = (self.right() - 1, self.bottom() - 1);

        for x in (left + 1)..right {
            positions.push(Position::new(x, top));
        }
        for y in (top + 1)..bottom {
            positions.push(Position::new(right, y));
        }
        for x in ((left + 1)..right).rev() {
            positions.push(Position::new(x, bottom));
        }
        for y in ((top + 1)..bottom).rev() {
            positions.push(Position::new(left, y));
        }

        positions
    }

    /// Smallest region covering both inputs.
    pub fn union(&self, other: &Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Region {
            x,
            y,
            width: (right - x) as u32,
            height: (bottom - y) as u32,
        }
    }

    /// Grows the region by `margin` cells on every side.
    pub fn expanded(&self, margin: u32) -> Region {
        Region {
            x: self.x.saturating_sub_unsigned(margin),
            y: self.y.saturating_sub_unsigned(margin),
            width: self.width.saturating_add(margin.saturating_mul(2)),
            height: self.height.saturating_add(margin.saturating_mul(2)),
        }
    }

    /// Width divided by height, always ≥ 1.0 (orientation independent).
    pub fn aspect_ratio(&self) -> f64 {
        let long = self.width.max(self.height) as f64;
        let short = self.width.min(self.height) as f64;
        long / short
    }
}
