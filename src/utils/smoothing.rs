//! # Path Smoothing
//!
//! Removes redundant waypoints from grid paths and optionally rounds off
//! corners. Every smoothed path is re-rasterized into orthogonally
//! contiguous cells and checked against the obstacle grid; a smoothing step
//! that would enter a blocked cell is discarded.

use crate::geometry::Position;
use crate::utils::obstacles::ObstacleGrid;

/// Upper bound on corner-cutting passes, reached at a smoothing factor of 1.0.
pub const MAX_CHAIKIN_PASSES: usize = 3;

/// Cells of an orthogonally stepping line from `a` to `b`, inclusive.
///
/// Each step moves one cell horizontally or vertically, choosing the axis
/// whose next cell boundary the ideal line crosses first (vertical on ties).
///
/// # Examples
///
/// ```
/// use floorplan::{line_cells, Position};
///
/// let cells = line_cells(Position::new(0, 0), Position::new(2, 1));
/// assert_eq!(cells.len(), 4);
/// assert_eq!(cells.last(), Some(&Position::new(2, 1)));
/// ```
pub fn line_cells(a: Position, b: Position) -> Vec<Position> {
    let nx = (b.x - a.x).unsigned_abs() as i64;
    let ny = (b.y - a.y).unsigned_abs() as i64;
    let sx = (b.x - a.x).signum();
    let sy = (b.y - a.y).signum();

    let mut cells = Vec::with_capacity((nx + ny + 1) as usize);
    let mut current = a;
    cells.push(current);

    let (mut ix, mut iy) = (0_i64, 0_i64);
    while ix < nx || iy < ny {
        if (1 + 2 * ix) * ny < (1 + 2 * iy) * nx {
            current.x += sx;
            ix += 1;
        } else {
            current.y += sy;
            iy += 1;
        }
        cells.push(current);
    }

    cells
}

/// True when every cell on the rasterized line from `a` to `b` is open.
pub fn has_line_of_sight(grid: &ObstacleGrid, a: Position, b: Position) -> bool {
    line_cells(a, b).into_iter().all(|cell| grid.is_open(cell))
}

/// Greedy line-of-sight reduction.
///
/// From each kept waypoint, jumps to the farthest later path cell that can
/// be reached by an obstacle-free straight line. Consecutive path cells are
/// always accepted, so the reduction never fails.
pub fn reduce_waypoints(path: &[Position], grid: &ObstacleGrid) -> Vec<Position> {
    let Some(&first) = path.first() else {
        return Vec::new();
    };

    let mut waypoints = vec![first];
    let mut anchor = 0;
    while anchor + 1 < path.len() {
        let mut next = anchor + 1;
        for candidate in ((anchor + 2)..path.len()).rev() {
            if has_line_of_sight(grid, path[anchor], path[candidate]) {
                next = candidate;
                break;
            }
        }
        waypoints.push(path[next]);
        anchor = next;
    }

    waypoints
}

/// Joins waypoints with [`line_cells`] into a contiguous cell path.
pub fn densify(waypoints: &[Position]) -> Vec<Position> {
    let mut cells: Vec<Position> = Vec::new();
    for pair in waypoints.windows(2) {
        let segment = line_cells(pair[0], pair[1]);
        let skip = usize::from(!cells.is_empty());
        cells.extend(segment.into_iter().skip(skip));
    }
    if cells.is_empty() {
        cells.extend(waypoints.first().copied());
    }
    cells
}

/// Smooths a grid path against `grid`.
///
/// `factor` in `[0, 1]` controls how many corner-rounding passes are tried
/// after the line-of-sight reduction; 0 disables them. The returned path
/// keeps the original endpoints and never contains a blocked cell that the
/// input did not already contain.
pub fn smooth_path(path: &[Position], grid: &ObstacleGrid, factor: f64) -> Vec<Position> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let waypoints = reduce_waypoints(path, grid);
    let reduced = densify(&waypoints);

    let passes = chaikin_passes(factor);
    if passes == 0 || waypoints.len() < 3 {
        return reduced;
    }

    let rounded = densify(&chaikin(&waypoints, passes));
    let endpoints_kept = rounded.first() == path.first() && rounded.last() == path.last();
    if endpoints_kept && rounded.iter().all(|&cell| grid.is_open(cell)) && rounded.len() <= reduced.len() {
        rounded
    } else {
        reduced
    }
}

fn chaikin_passes(factor: f64) -> usize {
    if !factor.is_finite() || factor <= 0.0 {
        return 0;
    }
    ((factor.min(1.0) * MAX_CHAIKIN_PASSES as f64).ceil() as usize).min(MAX_CHAIKIN_PASSES)
}

/// Chaikin corner cutting with fixed endpoints, snapped back to cells.
fn chaikin(waypoints: &[Position], passes: usize) -> Vec<Position> {
    let mut points: Vec<(f64, f64)> = waypoints
        .iter()
        .map(|p| (p.x as f64, p.y as f64))
        .collect();

    for _ in 0..passes {
        if points.len() < 3 {
            break;
        }
        let mut next = Vec::with_capacity(points.len() * 2);
        next.push(points[0]);
        for pair in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            next.push((0.75 * x0 + 0.25 * x1, 0.75 * y0 + 0.25 * y1));
            next.push((0.25 * x0 + 0.75 * x1, 0.25 * y0 + 0.75 * y1));
        }
        if let Some(&last) = points.last() {
            next.push(last);
        }
        points = next;
    }

    let mut snapped: Vec<Position> = Vec::with_capacity(points.len());
    for (x, y) in points {
        let cell = Position::new(x.round() as i32, y.round() as i32);
        if snapped.last() != Some(&cell) {
            snapped.push(cell);
        }
    }
    snapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Region;
    use crate::utils::pathfinding::{find_path, is_contiguous, Connectivity, PathOptions};

    #[test]
    fn test_line_cells_are_contiguous() {
        for (ax, ay, bx, by) in [(0, 0, 7, 3), (5, 5, 0, 0), (2, 8, 2, 1), (0, 0, -4, 9)] {
            let a = Position::new(ax, ay);
            let b = Position::new(bx, by);
            let cells = line_cells(a, b);
            assert_eq!(cells.first(), Some(&a));
            assert_eq!(cells.last(), Some(&b));
            assert_eq!(cells.len() as u32, a.manhattan_distance(b) + 1);
            assert!(is_contiguous(&cells, Connectivity::Four));
        }
    }

    #[test]
    fn test_line_of_sight_respects_obstacles() {
        let mut grid = ObstacleGrid::new(Position::new(0, 0), 10, 10);
        assert!(has_line_of_sight(&grid, Position::new(0, 0), Position::new(9, 0)));
        grid.set_blocked(Position::new(5, 0), true);
        assert!(!has_line_of_sight(&grid, Position::new(0, 0), Position::new(9, 0)));
    }

    #[test]
    fn test_reduce_collapses_staircase() {
        let grid = ObstacleGrid::new(Position::new(0, 0), 10, 10);
        let path = densify(&[
            Position::new(0, 0),
            Position::new(0, 4),
            Position::new(6, 4),
        ]);
        let waypoints = reduce_waypoints(&path, &grid);
        assert_eq!(waypoints, vec![Position::new(0, 0), Position::new(6, 4)]);
    }

    #[test]
    fn test_smoothing_never_enters_blocked_cells() {
        let room = Region::new(5, 5, 8, 8).unwrap();
        let grid = ObstacleGrid::from_regions(&[room], 6);
        let start = Position::new(0, 0);
        let end = Position::new(16, 16);
        let path = find_path(&grid, start, end, &PathOptions::cardinal());
        assert!(!path.is_empty());

        for factor in [0.0, 0.3, 1.0] {
            let smoothed = smooth_path(&path, &grid, factor);
            assert_eq!(smoothed.first(), Some(&start));
            assert_eq!(smoothed.last(), Some(&end));
            assert!(smoothed.iter().all(|&cell| grid.is_open(cell)));
            assert!(is_contiguous(&smoothed, Connectivity::Four));
            assert!(smoothed.len() <= path.len());
        }
    }

    #[test]
    fn test_smoothing_keeps_existing_steps_through_obstacles() {
        let mut grid = ObstacleGrid::new(Position::new(0, 0), 6, 1);
        grid.set_blocked(Position::new(3, 0), true);
        let path: Vec<Position> = (0..6).map(|x| Position::new(x, 0)).collect();

        let smoothed = smooth_path(&path, &grid, 1.0);
        assert_eq!(smoothed, path);
    }

    #[test]
    fn test_short_paths_are_untouched() {
        let grid = ObstacleGrid::new(Position::new(0, 0), 3, 3);
        let path = vec![Position::new(0, 0), Position::new(1, 0)];
        assert_eq!(smooth_path(&path, &grid, 1.0), path);
    }

    #[test]
    fn test_chaikin_pass_count_is_bounded() {
        assert_eq!(chaikin_passes(0.0), 0);
        assert_eq!(chaikin_passes(-1.0), 0);
        assert_eq!(chaikin_passes(0.2), 1);
        assert_eq!(chaikin_passes(1.0), MAX_CHAIKIN_PASSES);
        assert_eq!(chaikin_passes(25.0), MAX_CHAIKIN_PASSES);
    }
}
