//! # Obstacle Grids
//!
//! Boolean grids marking which cells a corridor search may not enter.
//!
//! A grid is placed in world coordinates through its `origin`; lookups
//! outside the grid report the cell as blocked, so searches never leave it.

use crate::geometry::{Position, Region};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Transient blocked/open map used by one pathfinding call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleGrid {
    origin: Position,
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl ObstacleGrid {
    /// Creates a fully open grid covering `width` x `height` cells from `origin`.
    pub fn new(origin: Position, width: usize, height: usize) -> Self {
        Self {
            origin,
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    /// Creates an open grid covering exactly `region`.
    pub fn covering(region: Region) -> Self {
        Self::new(
            Position::new(region.x, region.y),
            region.width as usize,
            region.height as usize,
        )
    }

    /// Rasterizes room interiors onto a grid sized to the bounding box of
    /// `regions` plus `margin` cells.
    ///
    /// The outermost ring of every region stays open so corridors can attach
    /// at the boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan::{ObstacleGrid, Position, Region};
    ///
    /// let room = Region::new(0, 0, 5, 5).unwrap();
    /// let grid = ObstacleGrid::from_regions(&[room], 2);
    /// assert!(grid.is_blocked(Position::new(2, 2)));
    /// assert!(!grid.is_blocked(Position::new(0, 2)));
    /// ```
    pub fn from_regions(regions: &[Region], margin: u32) -> Self {
        Self::build(regions, &[], margin)
    }

    /// Like [`ObstacleGrid::from_regions`] but also guarantees that every
    /// point in `extra` falls inside the grid.
    pub fn build(regions: &[Region], extra: &[Position], margin: u32) -> Self {
        let mut bounds: Option<Region> = None;
        for region in regions {
            bounds = Some(match bounds {
                Some(current) => current.union(region),
                None => *region,
            });
        }
        for &point in extra {
            let cell = Region {
                x: point.x,
                y: point.y,
                width: 1,
                height: 1,
            };
            bounds = Some(match bounds {
                Some(current) => current.union(&cell),
                None => cell,
            });
        }

        let Some(bounds) = bounds else {
            return Self::new(Position::new(0, 0), 0, 0);
        };

        let mut grid = Self::covering(bounds.expanded(margin));
        for region in regions {
            grid.block_interior(region);
        }
        grid
    }

    /// Marks every cell of `region` except its outermost ring as blocked.
    pub fn block_interior(&mut self, region: &Region) {
        for y in (region.y + 1)..(region.bottom() - 1) {
            for x in (region.x + 1)..(region.right() - 1) {
                self.set_blocked(Position::new(x, y), true);
            }
        }
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// World-space region covered by the grid, if it is non-empty.
    pub fn bounds(&self) -> Option<Region> {
        Region::new(
            self.origin.x,
            self.origin.y,
            self.width as u32,
            self.height as u32,
        )
    }

    /// Maps a world position to a cell index, or `None` outside the grid.
    pub fn index_of(&self, pos: Position) -> Option<usize> {
        let local_x = pos.x - self.origin.x;
        let local_y = pos.y - self.origin.y;
        if local_x < 0 || local_y < 0 {
            return None;
        }
        let (local_x, local_y) = (local_x as usize, local_y as usize);
        if local_x >= self.width || local_y >= self.height {
            return None;
        }
        Some(local_y * self.width + local_x)
    }

    /// Inverse of [`ObstacleGrid::index_of`].
    pub fn position_of(&self, index: usize) -> Position {
        Position::new(
            self.origin.x + (index % self.width) as i32,
            self.origin.y + (index / self.width) as i32,
        )
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        self.index_of(pos).is_some()
    }

    /// Reports whether a cell is blocked. Cells outside the grid are blocked.
    pub fn is_blocked(&self, pos: Position) -> bool {
        self.index_of(pos).map_or(true, |index| self.cells[index])
    }

    pub fn is_open(&self, pos: Position) -> bool {
        !self.is_blocked(pos)
    }

    /// Sets a cell's state; positions outside the grid are ignored.
    pub fn set_blocked(&mut self, pos: Position, blocked: bool) {
        if let Some(index) = self.index_of(pos) {
            self.cells[index] = blocked;
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|&&blocked| blocked).count()
    }

    /// Content hash covering placement, dimensions and every cell.
    ///
    /// Two grids with equal hashes are treated as interchangeable by the
    /// path cache.
    pub fn content_hash(&self) -> u64 {
        let mut bytes = Vec::with_capacity(24 + self.cells.len());
        bytes.extend(self.origin.x.to_le_bytes());
        bytes.extend(self.origin.y.to_le_bytes());
        bytes.extend((self.width as u64).to_le_bytes());
        bytes.extend((self.height as u64).to_le_bytes());
        bytes.extend(self.cells.iter().map(|&blocked| u8::from(blocked)));
        xxh3_64(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_covers_rooms_plus_margin() {
        let a = Region::new(0, 0, 5, 5).unwrap();
        let b = Region::new(20, 10, 4, 6).unwrap();
        let grid = ObstacleGrid::from_regions(&[a, b], 3);

        assert_eq!(grid.origin(), Position::new(-3, -3));
        assert_eq!(grid.width(), 24 + 6);
        assert_eq!(grid.height(), 16 + 6);
    }

    #[test]
    fn test_room_ring_stays_open() {
        let room = Region::new(2, 2, 5, 4).unwrap();
        let grid = ObstacleGrid::from_regions(&[room], 1);

        for pos in room.boundary_positions() {
            assert!(grid.is_open(pos), "ring cell {pos:?} should be open");
        }
        assert!(grid.is_open(Position::new(2, 2))); // corner
        assert!(grid.is_blocked(Position::new(3, 3)));
        assert!(grid.is_blocked(Position::new(5, 4)));
        assert_eq!(grid.blocked_count(), 3 * 2);
    }

    #[test]
    fn test_outside_cells_are_blocked() {
        let grid = ObstacleGrid::new(Position::new(0, 0), 4, 4);
        assert!(grid.is_open(Position::new(3, 3)));
        assert!(grid.is_blocked(Position::new(4, 3)));
        assert!(grid.is_blocked(Position::new(-1, 0)));
    }

    #[test]
    fn test_extra_points_extend_grid() {
        let room = Region::new(0, 0, 4, 4).unwrap();
        let far = Position::new(30, 1);
        let grid = ObstacleGrid::build(&[room], &[far], 1);
        assert!(grid.in_bounds(far));
        assert!(grid.is_open(far));
    }

    #[test]
    fn test_empty_input_produces_empty_grid() {
        let grid = ObstacleGrid::from_regions(&[], 5);
        assert_eq!(grid.cell_count(), 0);
        assert!(grid.bounds().is_none());
        assert!(grid.is_blocked(Position::new(0, 0)));
    }

    #[test]
    fn test_content_hash_tracks_cells() {
        let mut grid = ObstacleGrid::new(Position::new(0, 0), 6, 6);
        let before = grid.content_hash();
        assert_eq!(before, grid.clone().content_hash());

        grid.set_blocked(Position::new(2, 2), true);
        let after = grid.content_hash();
        assert_ne!(before, after);

        grid.set_blocked(Position::new(2, 2), false);
        assert_eq!(before, grid.content_hash());
    }

    #[test]
    fn test_content_hash_tracks_origin() {
        let a = ObstacleGrid::new(Position::new(0, 0), 6, 6);
        let b = ObstacleGrid::new(Position::new(1, 0), 6, 6);
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_index_round_trip() {
        let grid = ObstacleGrid::new(Position::new(-4, 7), 5, 3);
        let pos = Position::new(-2, 8);
        let index = grid.index_of(pos).unwrap();
        assert_eq!(grid.position_of(index), pos);
    }
}
