//! # Pathfinding Algorithms
//!
//! A* search over [`ObstacleGrid`] cells.
//!
//! The search is fully deterministic: frontier entries with equal estimated
//! cost are ordered by remaining heuristic, then by row, then by column, so
//! identical inputs always produce the identical path. A query that cannot
//! be satisfied returns an empty path rather than an error.

use crate::geometry::Position;
use crate::utils::obstacles::ObstacleGrid;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Neighbourhood used when expanding a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// North, east, south and west only.
    #[default]
    Four,
    /// Cardinals plus diagonals. Diagonal steps never cut a blocked corner.
    Eight,
}

/// Distance estimate used to guide the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Heuristic {
    #[default]
    Euclidean,
    Manhattan,
    Octile,
    /// Turns A* into Dijkstra's algorithm.
    Zero,
}

impl Heuristic {
    /// Estimated remaining cost between two cells.
    pub fn estimate(self, from: Position, to: Position) -> f64 {
        let dx = (from.x - to.x).abs() as f64;
        let dy = (from.y - to.y).abs() as f64;
        match self {
            Heuristic::Euclidean => (dx * dx + dy * dy).sqrt(),
            Heuristic::Manhattan => dx + dy,
            Heuristic::Octile => {
                let (long, short) = if dx > dy { (dx, dy) } else { (dy, dx) };
                long + (std::f64::consts::SQRT_2 - 1.0) * short
            }
            Heuristic::Zero => 0.0,
        }
    }
}

/// Per-cell movement cost multipliers layered over an obstacle grid.
///
/// Multipliers are clamped to at least 1.0 so the distance heuristics stay
/// admissible. Cells outside the overlay cost 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostGrid {
    origin: Position,
    width: usize,
    height: usize,
    costs: Vec<f64>,
}

impl CostGrid {
    /// Creates a uniform overlay shaped like `grid`.
    pub fn matching(grid: &ObstacleGrid) -> Self {
        Self {
            origin: grid.origin(),
            width: grid.width(),
            height: grid.height(),
            costs: vec![1.0; grid.cell_count()],
        }
    }

    fn index_of(&self, pos: Position) -> Option<usize> {
        let local_x = pos.x - self.origin.x;
        let local_y = pos.y - self.origin.y;
        if local_x < 0 || local_y < 0 {
            return None;
        }
        let (local_x, local_y) = (local_x as usize, local_y as usize);
        (local_x < self.width && local_y < self.height).then(|| local_y * self.width + local_x)
    }

    pub fn set_cost(&mut self, pos: Position, cost: f64) {
        if let Some(index) = self.index_of(pos) {
            self.costs[index] = if cost.is_finite() { cost.max(1.0) } else { 1.0 };
        }
    }

    pub fn cost_at(&self, pos: Position) -> f64 {
        self.index_of(pos).map_or(1.0, |index| self.costs[index])
    }
}

/// Knobs for a single search.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathOptions<'a> {
    pub connectivity: Connectivity,
    pub heuristic: Heuristic,
    pub costs: Option<&'a CostGrid>,
}

impl<'a> PathOptions<'a> {
    /// Four-connected search with the Euclidean heuristic.
    pub fn cardinal() -> Self {
        Self::default()
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_costs(mut self, costs: &'a CostGrid) -> Self {
        self.costs = Some(costs);
        self
    }
}

/// Reusable working memory for [`find_path_with_scratch`].
///
/// Buffers grow to the largest grid seen and are reset, not reallocated,
/// between searches.
#[derive(Debug, Default)]
pub struct SearchScratch {
    g_scores: Vec<f64>,
    came_from: Vec<usize>,
    closed: Vec<bool>,
}

impl SearchScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, cells: usize) {
        self.g_scores.clear();
        self.g_scores.resize(cells, f64::INFINITY);
        self.came_from.clear();
        self.came_from.resize(cells, usize::MAX);
        self.closed.clear();
        self.closed.resize(cells, false);
    }

    /// Number of cells the buffers can hold without growing.
    pub fn capacity(&self) -> usize {
        self.g_scores.capacity()
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    h: f64,
    g: f64,
    index: usize,
    pos: Position,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // Reversed so `BinaryHeap` pops the lowest (f, h, y, x) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.pos.y.cmp(&self.pos.y))
            .then_with(|| other.pos.x.cmp(&self.pos.x))
    }
}

/// Finds a shortest path from `start` to `end`, inclusive of both.
///
/// Returns an empty vector when either endpoint is blocked or outside the
/// grid, or when `end` is unreachable.
///
/// # Examples
///
/// ```
/// use floorplan::{find_path, ObstacleGrid, PathOptions, Position};
///
/// let grid = ObstacleGrid::new(Position::new(0, 0), 5, 5);
/// let path = find_path(&grid, Position::new(0, 0), Position::new(4, 0), &PathOptions::cardinal());
/// assert_eq!(path.len(), 5);
/// assert_eq!(path.first(), Some(&Position::new(0, 0)));
/// assert_eq!(path.last(), Some(&Position::new(4, 0)));
/// ```
pub fn find_path(
    grid: &ObstacleGrid,
    start: Position,
    end: Position,
    options: &PathOptions<'_>,
) -> Vec<Position> {
    let mut scratch = SearchScratch::new();
    find_path_with_scratch(grid, start, end, options, &mut scratch)
}

/// [`find_path`] using caller-provided working memory.
pub fn find_path_with_scratch(
    grid: &ObstacleGrid,
    start: Position,
    end: Position,
    options: &PathOptions<'_>,
    scratch: &mut SearchScratch,
) -> Vec<Position> {
    let (Some(start_index), Some(end_index)) = (grid.index_of(start), grid.index_of(end)) else {
        return Vec::new();
    };
    if grid.is_blocked(start) || grid.is_blocked(end) {
        return Vec::new();
    }
    if start == end {
        return vec![start];
    }

    scratch.reset(grid.cell_count());
    let mut open = BinaryHeap::new();

    let h = options.heuristic.estimate(start, end);
    scratch.g_scores[start_index] = 0.0;
    open.push(OpenNode {
        f: h,
        h,
        g: 0.0,
        index: start_index,
        pos: start,
    });

    while let Some(current) = open.pop() {
        if scratch.closed[current.index] || current.g > scratch.g_scores[current.index] {
            continue;
        }
        if current.index == end_index {
            return reconstruct_path(grid, &scratch.came_from, start_index, end_index);
        }
        scratch.closed[current.index] = true;

        for (next, step) in neighbors(grid, current.pos, options.connectivity) {
            let Some(next_index) = grid.index_of(next) else {
                continue;
            };
            if scratch.closed[next_index] {
                continue;
            }

            let multiplier = options.costs.map_or(1.0, |costs| costs.cost_at(next));
            let tentative = current.g + step * multiplier;
            if tentative < scratch.g_scores[next_index] {
                scratch.g_scores[next_index] = tentative;
                scratch.came_from[next_index] = current.index;
                let h = options.heuristic.estimate(next, end);
                open.push(OpenNode {
                    f: tentative + h,
                    h,
                    g: tentative,
                    index: next_index,
                    pos: next,
                });
            }
        }
    }

    Vec::new()
}

/// Open neighbours of `pos` with their base step cost, in a fixed order.
fn neighbors(
    grid: &ObstacleGrid,
    pos: Position,
    connectivity: Connectivity,
) -> impl Iterator<Item = (Position, f64)> + '_ {
    let cardinal = pos
        .cardinal_adjacent_positions()
        .into_iter()
        .filter(move |&next| grid.is_open(next))
        .map(|next| (next, 1.0));

    let diagonal = [(1, -1), (1, 1), (-1, 1), (-1, -1)]
        .into_iter()
        .filter(move |_| connectivity == Connectivity::Eight)
        .map(move |(dx, dy)| {
            (
                Position::new(pos.x + dx, pos.y + dy),
                Position::new(pos.x + dx, pos.y),
                Position::new(pos.x, pos.y + dy),
            )
        })
        .filter(move |&(next, side_a, side_b)| {
            grid.is_open(next) && grid.is_open(side_a) && grid.is_open(side_b)
        })
        .map(|(next, _, _)| (next, std::f64::consts::SQRT_2));

    cardinal.chain(diagonal)
}

fn reconstruct_path(
    grid: &ObstacleGrid,
    came_from: &[usize],
    start_index: usize,
    end_index: usize,
) -> Vec<Position> {
    let mut path = vec![grid.position_of(end_index)];
    let mut current = end_index;
    while current != start_index {
        current = came_from[current];
        path.push(grid.position_of(current));
    }
    path.reverse();
    path
}

/// Total movement cost of a path, counting diagonal steps as √2.
pub fn path_cost(path: &[Position]) -> f64 {
    path.windows(2)
        .map(|pair| pair[0].euclidean_distance(pair[1]))
        .sum()
}

/// Checks that consecutive cells are neighbours under `connectivity`.
pub fn is_contiguous(path: &[Position], connectivity: Connectivity) -> bool {
    path.windows(2).all(|pair| {
        let dx = (pair[0].x - pair[1].x).abs();
        let dy = (pair[0].y - pair[1].y).abs();
        match connectivity {
            Connectivity::Four => dx + dy == 1,
            Connectivity::Eight => dx.max(dy) == 1,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Region;

    fn open_grid(width: usize, height: usize) -> ObstacleGrid {
        ObstacleGrid::new(Position::new(0, 0), width, height)
    }

    #[test]
    fn test_straight_line_path() {
        let grid = open_grid(10, 3);
        let path = find_path(
            &grid,
            Position::new(0, 1),
            Position::new(9, 1),
            &PathOptions::cardinal(),
        );
        assert_eq!(path.len(), 10);
        assert!(path.iter().all(|p| p.y == 1));
    }

    #[test]
    fn test_start_equals_end() {
        let grid = open_grid(3, 3);
        let here = Position::new(1, 1);
        assert_eq!(find_path(&grid, here, here, &PathOptions::cardinal()), vec![here]);
    }

    #[test]
    fn test_path_routes_around_wall() {
        let mut grid = open_grid(7, 7);
        for y in 0..6 {
            grid.set_blocked(Position::new(3, y), true);
        }

        let start = Position::new(0, 0);
        let end = Position::new(6, 0);
        let path = find_path(&grid, start, end, &PathOptions::cardinal());

        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        assert!(path.iter().all(|&p| grid.is_open(p)));
        assert!(path.contains(&Position::new(3, 6)));
        assert!(is_contiguous(&path, Connectivity::Four));
    }

    #[test]
    fn test_unreachable_returns_empty() {
        let mut grid = open_grid(5, 5);
        for y in 0..5 {
            grid.set_blocked(Position::new(2, y), true);
        }
        let path = find_path(
            &grid,
            Position::new(0, 0),
            Position::new(4, 4),
            &PathOptions::cardinal(),
        );
        assert!(path.is_empty());
    }

    #[test]
    fn test_blocked_or_outside_endpoints_return_empty() {
        let mut grid = open_grid(5, 5);
        grid.set_blocked(Position::new(4, 4), true);
        let options = PathOptions::cardinal();

        assert!(find_path(&grid, Position::new(0, 0), Position::new(4, 4), &options).is_empty());
        assert!(find_path(&grid, Position::new(4, 4), Position::new(0, 0), &options).is_empty());
        assert!(find_path(&grid, Position::new(0, 0), Position::new(9, 9), &options).is_empty());
    }

    #[test]
    fn test_eight_connected_is_shorter_and_never_cuts_corners() {
        let mut grid = open_grid(6, 6);
        let options = PathOptions::cardinal()
            .with_connectivity(Connectivity::Eight)
            .with_heuristic(Heuristic::Octile);
        let diagonal = find_path(&grid, Position::new(0, 0), Position::new(5, 5), &options);
        assert_eq!(diagonal.len(), 6);

        grid.set_blocked(Position::new(1, 0), true);
        grid.set_blocked(Position::new(0, 1), true);
        let boxed_in = find_path(&grid, Position::new(0, 0), Position::new(5, 5), &options);
        assert!(boxed_in.is_empty(), "diagonal squeeze between two walls is not allowed");
    }

    #[test]
    fn test_cost_overlay_diverts_path() {
        let grid = open_grid(5, 3);
        let mut costs = CostGrid::matching(&grid);
        for x in 1..4 {
            costs.set_cost(Position::new(x, 1), 50.0);
        }
        let options = PathOptions::cardinal().with_costs(&costs);
        let path = find_path(&grid, Position::new(0, 1), Position::new(4, 1), &options);

        assert!(!path.is_empty());
        assert!(path[1..path.len() - 1].iter().all(|p| p.y != 1));
    }

    #[test]
    fn test_cost_overlay_clamps_below_one() {
        let grid = open_grid(3, 3);
        let mut costs = CostGrid::matching(&grid);
        costs.set_cost(Position::new(1, 1), 0.1);
        costs.set_cost(Position::new(2, 1), f64::NAN);
        assert_eq!(costs.cost_at(Position::new(1, 1)), 1.0);
        assert_eq!(costs.cost_at(Position::new(2, 1)), 1.0);
        assert_eq!(costs.cost_at(Position::new(9, 9)), 1.0);
    }

    #[test]
    fn test_identical_inputs_identical_paths() {
        let room = Region::new(4, 4, 6, 6).unwrap();
        let grid = ObstacleGrid::from_regions(&[room], 4);
        let start = Position::new(0, 0);
        let end = Position::new(13, 13);

        let first = find_path(&grid, start, end, &PathOptions::cardinal());
        for _ in 0..5 {
            assert_eq!(find_path(&grid, start, end, &PathOptions::cardinal()), first);
        }
    }

    #[test]
    fn test_scratch_reuse_matches_fresh_search() {
        let grid = open_grid(12, 12);
        let mut scratch = SearchScratch::new();
        let options = PathOptions::cardinal();
        let a = find_path_with_scratch(&grid, Position::new(0, 0), Position::new(11, 3), &options, &mut scratch);
        let b = find_path_with_scratch(&grid, Position::new(2, 9), Position::new(7, 0), &options, &mut scratch);

        assert_eq!(a, find_path(&grid, Position::new(0, 0), Position::new(11, 3), &options));
        assert_eq!(b, find_path(&grid, Position::new(2, 9), Position::new(7, 0), &options));
        assert!(scratch.capacity() >= 144);
    }

    #[test]
    fn test_path_cost() {
        let path = [Position::new(0, 0), Position::new(1, 0), Position::new(2, 1)];
        let cost = path_cost(&path);
        assert!((cost - (1.0 + std::f64::consts::SQRT_2)).abs() < 1e-9);
    }
}
