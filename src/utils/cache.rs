//! # Path Cache and Search Pool
//!
//! A [`PathfindingSession`] bundles the only mutable state shared between
//! corridor searches of one generation call: a bounded result cache and a
//! pool of reusable search buffers. Sessions are owned and passed
//! explicitly; nothing here is global.

use crate::geometry::Position;
use crate::utils::obstacles::ObstacleGrid;
use crate::utils::pathfinding::{find_path_with_scratch, PathOptions, SearchScratch};
use log::trace;
use std::collections::{HashMap, VecDeque};

/// Default number of cached paths per session.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PathKey {
    start: Position,
    end: Position,
    grid_hash: u64,
}

/// Bounded cache of search results keyed by endpoints and grid content.
///
/// The cache tracks the content hash of the last grid it was synchronized
/// with and drops every entry as soon as a grid with different content is
/// presented.
#[derive(Debug)]
pub struct PathCache {
    capacity: usize,
    entries: HashMap<PathKey, Vec<Position>>,
    order: VecDeque<PathKey>,
    grid_hash: Option<u64>,
    hits: u64,
    misses: u64,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            grid_hash: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Records `grid` as the current obstacle map, invalidating entries
    /// computed against different content. Returns the grid's hash.
    pub fn sync(&mut self, grid: &ObstacleGrid) -> u64 {
        let hash = grid.content_hash();
        if self.grid_hash != Some(hash) {
            if !self.entries.is_empty() {
                trace!("Obstacle grid changed, dropping {} cached paths", self.entries.len());
            }
            self.entries.clear();
            self.order.clear();
            self.grid_hash = Some(hash);
        }
        hash
    }

    pub fn get(&mut self, start: Position, end: Position, grid_hash: u64) -> Option<&Vec<Position>> {
        let key = PathKey { start, end, grid_hash };
        match self.entries.get(&key) {
            Some(path) => {
                self.hits += 1;
                Some(path)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a result, evicting the oldest entry when full.
    pub fn insert(&mut self, start: Position, end: Position, grid_hash: u64, path: Vec<Position>) {
        let key = PathKey { start, end, grid_hash };
        if self.entries.insert(key, path).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drops every entry and forgets the current grid.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.grid_hash = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Free list of search buffers.
#[derive(Debug, Default)]
pub struct PathPool {
    free: Vec<SearchScratch>,
    created: usize,
}

impl PathPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a buffer from the pool, allocating one if none is free.
    pub fn acquire(&mut self) -> SearchScratch {
        self.free.pop().unwrap_or_else(|| {
            self.created += 1;
            SearchScratch::new()
        })
    }

    pub fn release(&mut self, scratch: SearchScratch) {
        self.free.push(scratch);
    }

    /// Number of buffers ever allocated by this pool.
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// Cached, pooled A* searches for one generation call.
#[derive(Debug)]
pub struct PathfindingSession {
    cache: PathCache,
    pool: PathPool,
}

impl PathfindingSession {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: PathCache::new(cache_capacity),
            pool: PathPool::new(),
        }
    }

    /// Runs (or recalls) a search on `grid`.
    ///
    /// Cost overlays are not part of the cache key, so queries that pass
    /// `options.costs` bypass the cache.
    pub fn find_path(
        &mut self,
        grid: &ObstacleGrid,
        start: Position,
        end: Position,
        options: &PathOptions<'_>,
    ) -> Vec<Position> {
        let grid_hash = self.cache.sync(grid);
        let cacheable = options.costs.is_none();
        if cacheable {
            if let Some(path) = self.cache.get(start, end, grid_hash) {
                return path.clone();
            }
        }

        let mut scratch = self.pool.acquire();
        let path = find_path_with_scratch(grid, start, end, options, &mut scratch);
        self.pool.release(scratch);

        if cacheable {
            self.cache.insert(start, end, grid_hash, path.clone());
        }
        path
    }

    /// Starts over for a new room layout.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn pool(&self) -> &PathPool {
        &self.pool
    }
}

impl Default for PathfindingSession {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::pathfinding::find_path;

    fn grid() -> ObstacleGrid {
        ObstacleGrid::new(Position::new(0, 0), 8, 8)
    }

    #[test]
    fn test_cache_hits_on_repeat_query() {
        let grid = grid();
        let mut session = PathfindingSession::new(16);
        let options = PathOptions::cardinal();

        let first = session.find_path(&grid, Position::new(0, 0), Position::new(7, 7), &options);
        let second = session.find_path(&grid, Position::new(0, 0), Position::new(7, 7), &options);

        assert_eq!(first, second);
        assert_eq!(session.cache().hits(), 1);
        assert_eq!(session.cache().misses(), 1);
    }

    #[test]
    fn test_cache_invalidates_when_grid_changes() {
        let mut grid = grid();
        let mut session = PathfindingSession::new(16);
        let options = PathOptions::cardinal();
        let start = Position::new(0, 3);
        let end = Position::new(7, 3);

        let open_path = session.find_path(&grid, start, end, &options);
        assert_eq!(session.cache().len(), 1);

        for y in 0..7 {
            grid.set_blocked(Position::new(4, y), true);
        }
        let detour = session.find_path(&grid, start, end, &options);

        assert_ne!(open_path, detour);
        assert_eq!(detour, find_path(&grid, start, end, &options));
        assert_eq!(session.cache().len(), 1);
        assert!(detour.iter().all(|&cell| grid.is_open(cell)));
    }

    #[test]
    fn test_cache_is_bounded() {
        let grid = grid();
        let mut cache = PathCache::new(2);
        let hash = cache.sync(&grid);
        for x in 0..5 {
            cache.insert(Position::new(x, 0), Position::new(0, 0), hash, Vec::new());
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(Position::new(0, 0), Position::new(0, 0), hash).is_none());
        assert!(cache.get(Position::new(4, 0), Position::new(0, 0), hash).is_some());
    }

    #[test]
    fn test_cost_overlay_queries_bypass_cache() {
        let grid = grid();
        let costs = crate::utils::pathfinding::CostGrid::matching(&grid);
        let mut session = PathfindingSession::new(16);
        let options = PathOptions::cardinal().with_costs(&costs);

        session.find_path(&grid, Position::new(0, 0), Position::new(3, 3), &options);
        assert!(session.cache().is_empty());
    }

    #[test]
    fn test_pool_reuses_buffers() {
        let grid = grid();
        let mut session = PathfindingSession::new(16);
        let options = PathOptions::cardinal();
        for x in 1..6 {
            session.find_path(&grid, Position::new(0, 0), Position::new(x, 5), &options);
        }
        assert_eq!(session.pool().created(), 1);
        assert_eq!(session.pool().available(), 1);
    }

    #[test]
    fn test_reset_clears_cache() {
        let grid = grid();
        let mut session = PathfindingSession::default();
        session.find_path(&grid, Position::new(0, 0), Position::new(2, 2), &PathOptions::cardinal());
        assert!(!session.cache().is_empty());
        session.reset();
        assert!(session.cache().is_empty());
    }
}
