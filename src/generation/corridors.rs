//! # Corridor Network
//!
//! Connects rooms in two passes plus a repair step:
//!
//! 1. A minimum spanning tree over the core rooms (large rooms spread over
//!    the map quadrants) is carved as wide primary corridors.
//! 2. Every other room attaches once, with a narrow corridor, to the nearer
//!    of the closest connected room or the closest existing corridor cell.
//! 3. Disconnected components are joined until every room is reachable,
//!    falling back to L-shaped corridors when no route is found.
//!
//! Each corridor is routed on an obstacle grid built for just the rooms it
//! joins, so routes are short and searches stay cheap.

use super::connectivity::RoomGraph;
use super::utils::{create_rng, facing_boundary_points};
use super::{
    Corridor, CorridorKind, CorridorSettings, GenerationEvent, GenerationSettings, Room,
    ValidationReport,
};
use crate::geometry::{Position, Region};
use crate::utils::{
    densify, is_contiguous, smooth_path, Connectivity, ObstacleGrid, PathOptions,
    PathfindingSession,
};
use crate::{config, FloorplanError, FloorplanResult};
use ::pathfinding::prelude::kruskal_indices;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

impl ObstacleGrid {
    /// Obstacle grid for a set of rooms: interiors blocked, boundary rings
    /// and a `margin`-cell border open.
    pub fn from_rooms(rooms: &[Room], margin: u32) -> Self {
        let regions: Vec<Region> = rooms.iter().map(|room| room.bounds).collect();
        Self::from_regions(&regions, margin)
    }
}

/// Corridors of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorNetwork {
    /// Corridors in creation order; `corridors[i].id == i`
    pub corridors: Vec<Corridor>,
    /// Rooms anchoring the primary backbone, in selection order
    pub core_rooms: Vec<u32>,
    pub events: Vec<GenerationEvent>,
    pub stats: CorridorStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorridorStats {
    pub primary: usize,
    pub secondary: usize,
    pub repair: usize,
    pub failed: usize,
    /// Corridor pairs sharing at least one cell
    pub intersections: usize,
    pub total_length: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Corridor network builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorridorGenerator;

impl CorridorGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Connects every room, updating room connections and doorways.
    ///
    /// Deterministic for the same rooms, settings and seed. The result is
    /// always fully connected; the only errors are an empty room list,
    /// duplicate room IDs and invalid settings.
    pub fn connect_rooms(
        &self,
        rooms: &mut [Room],
        settings: &GenerationSettings,
        seed: u64,
    ) -> FloorplanResult<CorridorNetwork> {
        let mut session = PathfindingSession::new(settings.corridor.cache_capacity);
        self.connect_rooms_with_session(rooms, settings, seed, &mut session)
    }

    /// [`CorridorGenerator::connect_rooms`] with a caller-owned search
    /// session. The session's cache is cleared first.
    pub fn connect_rooms_with_session(
        &self,
        rooms: &mut [Room],
        settings: &GenerationSettings,
        seed: u64,
        session: &mut PathfindingSession,
    ) -> FloorplanResult<CorridorNetwork> {
        if rooms.is_empty() {
            return Err(FloorplanError::InvalidInput(
                "cannot build corridors without rooms".to_string(),
            ));
        }
        settings.validate()?;
        let mut seen = HashSet::new();
        if let Some(room) = rooms.iter().find(|room| !seen.insert(room.id)) {
            return Err(FloorplanError::InvalidInput(format!(
                "room id {} appears more than once",
                room.id
            )));
        }

        session.reset();
        let core = select_core_rooms(rooms, &settings.bounds);
        let core_rooms: Vec<u32> = core.iter().map(|&index| rooms[index].id).collect();
        debug!("Selected {} core rooms out of {}", core.len(), rooms.len());

        let mut builder = NetworkBuilder::new(rooms, &settings.corridor, create_rng(seed), session);
        builder.primary_pass(&core);
        builder.secondary_pass(&core);
        builder.repair_pass();
        let intersections = if settings.corridor.optimize {
            builder.optimize()
        } else {
            0
        };
        let (corridors, events, failed) = builder.finish();

        apply_connections(rooms, &corridors);

        let count = |kind: CorridorKind| corridors.iter().filter(|c| c.kind == kind).count();
        let stats = CorridorStats {
            primary: count(CorridorKind::Primary),
            secondary: count(CorridorKind::Secondary),
            repair: count(CorridorKind::Repair),
            failed,
            intersections,
            total_length: corridors.iter().map(Corridor::length).sum(),
            cache_hits: session.cache().hits(),
            cache_misses: session.cache().misses(),
        };
        debug!(
            "Built {} corridors ({} primary, {} secondary, {} repair, {} failed)",
            corridors.len(),
            stats.primary,
            stats.secondary,
            stats.repair,
            stats.failed
        );

        Ok(CorridorNetwork {
            corridors,
            core_rooms,
            events,
            stats,
        })
    }

    /// Best-effort corridor between two rooms.
    ///
    /// Returns `None` instead of an error when the settings are invalid or
    /// no route is found.
    pub fn connect_pair(
        &self,
        a: &Room,
        b: &Room,
        settings: &GenerationSettings,
        rng: &mut StdRng,
    ) -> Option<Corridor> {
        if settings.validate().is_err() || a.id == b.id {
            return None;
        }
        let mut session = PathfindingSession::new(settings.corridor.cache_capacity);
        let corridor = &settings.corridor;
        let route = route_between(&a.bounds, &b.bounds, corridor, rng, &mut session)?;
        Some(Corridor {
            id: 0,
            room_a: a.id,
            room_b: b.id,
            start: route.start,
            end: route.end,
            width: corridor.secondary_width,
            kind: CorridorKind::Secondary,
            attached_to: None,
            path: route.path,
        })
    }
}

/// Indices of the rooms anchoring the primary backbone.
///
/// Takes `min(n, max(2, ceil(0.7 n)))` rooms: the largest room of each map
/// quadrant (NW, NE, SW, SE) first, then the largest remaining rooms.
pub fn select_core_rooms(rooms: &[Room], bounds: &Region) -> Vec<usize> {
    let n = rooms.len();
    let target = ((n as f64 * config::CORE_ROOM_FRACTION).ceil() as usize)
        .max(2)
        .min(n);

    let mut by_size: Vec<usize> = (0..n).collect();
    by_size.sort_by(|&a, &b| {
        rooms[b]
            .area()
            .cmp(&rooms[a].area())
            .then(rooms[a].id.cmp(&rooms[b].id))
    });

    let (cx, cy) = bounds.center_f64();
    let quadrant = |room: &Room| {
        let (x, y) = room.bounds.center_f64();
        usize::from(x >= cx) + 2 * usize::from(y >= cy)
    };

    let mut core: Vec<usize> = Vec::with_capacity(target);
    for q in 0..4 {
        if core.len() >= target {
            break;
        }
        if let Some(&index) = by_size
            .iter()
            .find(|&&index| quadrant(&rooms[index]) == q && !core.contains(&index))
        {
            core.push(index);
        }
    }
    for &index in &by_size {
        if core.len() >= target {
            break;
        }
        if !core.contains(&index) {
            core.push(index);
        }
    }
    core
}

/// Structural check of a corridor network.
///
/// Reports corridors whose paths break the endpoint or contiguity
/// invariants, widths outside the configured pair, references to missing
/// rooms or corridors, and any room unreachable from the others.
pub fn validate_corridors(
    rooms: &[Room],
    corridors: &[Corridor],
    settings: &CorridorSettings,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    let room_ids: BTreeSet<u32> = rooms.iter().map(|room| room.id).collect();
    let corridor_ids: BTreeSet<u32> = corridors.iter().map(|c| c.id).collect();

    for corridor in corridors {
        let id = corridor.id;
        if corridor.path.is_empty() {
            report.error(format!("corridor {id} has an empty path"));
        } else if !corridor.endpoints_match() {
            report.error(format!("corridor {id} path does not run from start to end"));
        }
        if !is_contiguous(&corridor.path, Connectivity::Four) {
            report.error(format!("corridor {id} path has gaps"));
        }
        if corridor.width != settings.primary_width && corridor.width != settings.secondary_width {
            report.error(format!("corridor {id} has width {}", corridor.width));
        }
        for room_id in [corridor.room_a, corridor.room_b] {
            if !room_ids.contains(&room_id) {
                report.error(format!("corridor {id} refers to missing room {room_id}"));
            }
        }
        if let Some(host) = corridor.attached_to {
            if !corridor_ids.contains(&host) {
                report.error(format!("corridor {id} branches off missing corridor {host}"));
            }
        }
    }

    let graph = RoomGraph::from_corridors(room_ids.iter().copied(), corridors);
    let components = graph.components();
    if components.len() > 1 {
        report.error(format!(
            "rooms form {} disconnected groups",
            components.len()
        ));
    }

    report
}

struct Route {
    start: Position,
    end: Position,
    path: Vec<Position>,
}

enum Target {
    Room(usize),
    CorridorCell { corridor: usize, cell: Position },
}

/// Mutable state of one bulk connection call.
struct NetworkBuilder<'a> {
    rooms: &'a [Room],
    index: HashMap<u32, usize>,
    settings: &'a CorridorSettings,
    rng: StdRng,
    session: &'a mut PathfindingSession,
    corridors: Vec<Corridor>,
    events: Vec<GenerationEvent>,
    failed: usize,
}

impl<'a> NetworkBuilder<'a> {
    fn new(
        rooms: &'a [Room],
        settings: &'a CorridorSettings,
        rng: StdRng,
        session: &'a mut PathfindingSession,
    ) -> Self {
        let index = rooms
            .iter()
            .enumerate()
            .map(|(index, room)| (room.id, index))
            .collect();
        Self {
            rooms,
            index,
            settings,
            rng,
            session,
            corridors: Vec::new(),
            events: Vec::new(),
            failed: 0,
        }
    }

    fn primary_pass(&mut self, core: &[usize]) {
        let rooms = self.rooms;
        let mut edges = Vec::new();
        for i in 0..core.len() {
            for j in (i + 1)..core.len() {
                let distance = rooms[core[i]]
                    .center()
                    .distance_squared(rooms[core[j]].center());
                edges.push((i, j, (distance, i, j)));
            }
        }

        let wanted = core.len().saturating_sub(1);
        let tree: Vec<(usize, usize)> = kruskal_indices(core.len(), &edges)
            .take(wanted)
            .map(|(i, j, _)| (i, j))
            .collect();
        for (i, j) in tree {
            let (a, b) = (&rooms[core[i]], &rooms[core[j]]);
            match self.route(&a.bounds, &b.bounds) {
                Some(route) => {
                    self.push(a.id, b.id, route, self.settings.primary_width, CorridorKind::Primary, None);
                }
                None => self.fail(a.id, b.id, "no route between core rooms"),
            }
        }
    }

    fn secondary_pass(&mut self, core: &[usize]) {
        let rooms = self.rooms;
        let mut connected: BTreeSet<usize> = core.iter().copied().collect();
        let mut others: Vec<usize> = (0..rooms.len()).filter(|i| !connected.contains(i)).collect();
        others.sort_by_key(|&index| rooms[index].id);

        let fallback = core.first().map(|&index| rooms[index].id);
        for index in others {
            let room = &rooms[index];
            let (attached, target) = match self.nearest_target(index, &connected) {
                Some(Target::CorridorCell { corridor, cell }) => {
                    let host_room = self.corridors[corridor].room_a;
                    let attached = self.attach_to_corridor(room, corridor, cell)
                        || self.attach_to_nearest_room(index, &connected);
                    (attached, Some(host_room))
                }
                Some(Target::Room(other)) => {
                    (self.carve_secondary(room, &rooms[other]), Some(rooms[other].id))
                }
                None => (false, fallback),
            };
            if attached {
                connected.insert(index);
            } else {
                let target = target.unwrap_or(room.id);
                self.fail(room.id, target, "no attachment point reachable");
            }
        }
    }

    fn repair_pass(&mut self) {
        let rooms = self.rooms;
        for _ in 0..rooms.len() {
            let graph = RoomGraph::from_corridors(rooms.iter().map(|r| r.id), &self.corridors);
            let components = graph.components();
            if components.len() <= 1 {
                return;
            }
            warn!("Corridor network has {} components, repairing", components.len());

            for pair in components.windows(2) {
                let Some((a, b)) = self.closest_pair(&pair[0], &pair[1]) else {
                    continue;
                };
                let (a, b) = (&rooms[a], &rooms[b]);
                let route = match self.route(&a.bounds, &b.bounds) {
                    Some(route) => route,
                    None => self.l_shaped(&a.bounds, &b.bounds),
                };
                self.push(a.id, b.id, route, self.settings.secondary_width, CorridorKind::Repair, None);
            }
        }
    }

    /// Counts intersecting corridor pairs, then re-smooths every corridor no
    /// branch is attached to against a grid of all rooms.
    fn optimize(&mut self) -> usize {
        let cells: Vec<HashSet<Position>> = self
            .corridors
            .iter()
            .map(|c| c.path.iter().copied().collect())
            .collect();
        let mut intersections = 0;
        for i in 0..cells.len() {
            for j in (i + 1)..cells.len() {
                if !cells[i].is_disjoint(&cells[j]) {
                    intersections += 1;
                }
            }
        }

        let anchors: HashSet<u32> = self.corridors.iter().filter_map(|c| c.attached_to).collect();
        let regions: Vec<Region> = self.rooms.iter().map(|room| room.bounds).collect();
        let endpoints: Vec<Position> = self
            .corridors
            .iter()
            .flat_map(|c| [c.start, c.end])
            .collect();
        let grid = ObstacleGrid::build(&regions, &endpoints, self.settings.grid_margin);

        for corridor in &mut self.corridors {
            if anchors.contains(&corridor.id) {
                continue;
            }
            corridor.path = smooth_path(&corridor.path, &grid, self.settings.path_smoothing_factor);
        }
        intersections
    }

    fn finish(self) -> (Vec<Corridor>, Vec<GenerationEvent>, usize) {
        (self.corridors, self.events, self.failed)
    }

    fn nearest_target(&self, index: usize, connected: &BTreeSet<usize>) -> Option<Target> {
        let room = &self.rooms[index];
        let center = room.center();

        let nearest_room = connected
            .iter()
            .filter(|&&other| other != index)
            .map(|&other| (center.distance_squared(self.rooms[other].center()), self.rooms[other].id, other))
            .min();

        let nearest_cell = self
            .corridors
            .iter()
            .enumerate()
            .flat_map(|(c, corridor)| corridor.path.iter().map(move |&cell| (c, cell)))
            .filter(|&(_, cell)| !room.bounds.contains(cell))
            .map(|(c, cell)| (center.distance_squared(cell), c, cell))
            .min_by_key(|&(distance, c, _)| (distance, c));

        match (nearest_room, nearest_cell) {
            (Some((room_distance, _, other)), Some((cell_distance, corridor, cell))) => {
                if cell_distance < room_distance {
                    Some(Target::CorridorCell { corridor, cell })
                } else {
                    Some(Target::Room(other))
                }
            }
            (Some((_, _, other)), None) => Some(Target::Room(other)),
            (None, Some((_, corridor, cell))) => Some(Target::CorridorCell { corridor, cell }),
            (None, None) => None,
        }
    }

    fn attach_to_corridor(&mut self, room: &Room, corridor: usize, cell: Position) -> bool {
        let Some(host) = self.corridors.get(corridor) else {
            return false;
        };
        let (host_id, host_room) = (host.id, host.room_a);

        let grid = ObstacleGrid::build(&[room.bounds], &[cell], self.settings.grid_margin);
        for _ in 0..self.settings.max_route_attempts {
            let Some(start) = pick_anchor(&room.bounds, cell, &mut self.rng) else {
                return false;
            };
            if let Some(path) = self.search(&grid, start, cell) {
                let route = Route {
                    start,
                    end: cell,
                    path,
                };
                self.push(
                    room.id,
                    host_room,
                    route,
                    self.settings.secondary_width,
                    CorridorKind::Secondary,
                    Some(host_id),
                );
                return true;
            }
        }
        false
    }

    fn attach_to_nearest_room(&mut self, index: usize, connected: &BTreeSet<usize>) -> bool {
        let rooms = self.rooms;
        let center = rooms[index].center();
        let nearest = connected
            .iter()
            .filter(|&&other| other != index)
            .min_by_key(|&&other| (center.distance_squared(rooms[other].center()), rooms[other].id));
        match nearest {
            Some(&other) => self.carve_secondary(&rooms[index], &rooms[other]),
            None => false,
        }
    }

    fn carve_secondary(&mut self, a: &Room, b: &Room) -> bool {
        match self.route(&a.bounds, &b.bounds) {
            Some(route) => {
                self.push(a.id, b.id, route, self.settings.secondary_width, CorridorKind::Secondary, None);
                true
            }
            None => false,
        }
    }

    fn route(&mut self, a: &Region, b: &Region) -> Option<Route> {
        route_between(a, b, self.settings, &mut self.rng, self.session)
    }

    fn search(&mut self, grid: &ObstacleGrid, start: Position, end: Position) -> Option<Vec<Position>> {
        search(grid, start, end, self.settings, self.session)
    }

    /// Horizontal-then-vertical or vertical-then-horizontal corridor between
    /// facing boundary points, ignoring obstacles.
    fn l_shaped(&mut self, a: &Region, b: &Region) -> Route {
        let (start, end) =
            facing_boundary_points(a, b).unwrap_or_else(|| (a.center(), b.center()));
        let corner = if self.rng.gen_bool(0.5) {
            Position::new(end.x, start.y)
        } else {
            Position::new(start.x, end.y)
        };
        debug!("Falling back to L-shaped corridor from {:?} to {:?}", start, end);
        Route {
            start,
            end,
            path: densify(&[start, corner, end]),
        }
    }

    fn closest_pair(&self, first: &[u32], second: &[u32]) -> Option<(usize, usize)> {
        let mut best: Option<(i64, u32, u32, usize, usize)> = None;
        for &a_id in first {
            for &b_id in second {
                let (Some(&a), Some(&b)) = (self.index.get(&a_id), self.index.get(&b_id)) else {
                    continue;
                };
                let distance = self.rooms[a].center().distance_squared(self.rooms[b].center());
                let candidate = (distance, a_id, b_id, a, b);
                if best.map_or(true, |current| candidate < current) {
                    best = Some(candidate);
                }
            }
        }
        best.map(|(_, _, _, a, b)| (a, b))
    }

    fn push(
        &mut self,
        room_a: u32,
        room_b: u32,
        route: Route,
        width: u32,
        kind: CorridorKind,
        attached_to: Option<u32>,
    ) {
        let id = self.corridors.len() as u32;
        self.corridors.push(Corridor {
            id,
            room_a,
            room_b,
            start: route.start,
            end: route.end,
            width,
            kind,
            attached_to,
            path: route.path,
        });
        self.events.push(GenerationEvent::CorridorGenerated {
            corridor_id: id,
            room_a,
            room_b,
            kind,
        });
    }

    fn fail(&mut self, room_a: u32, room_b: u32, reason: &str) {
        warn!("Corridor between rooms {} and {} failed: {}", room_a, room_b, reason);
        self.failed += 1;
        self.events.push(GenerationEvent::CorridorGenerationFailed {
            room_a,
            room_b,
            reason: reason.to_string(),
        });
    }
}

/// Routes a corridor between two rooms on a grid holding just those rooms,
/// trying up to `max_route_attempts` pairs of seeded boundary points.
fn route_between(
    a: &Region,
    b: &Region,
    settings: &CorridorSettings,
    rng: &mut StdRng,
    session: &mut PathfindingSession,
) -> Option<Route> {
    let grid = ObstacleGrid::from_regions(&[*a, *b], settings.grid_margin);
    for _ in 0..settings.max_route_attempts {
        let start = pick_anchor(a, b.center(), rng)?;
        let end = pick_anchor(b, a.center(), rng)?;
        if let Some(path) = search(&grid, start, end, settings, session) {
            return Some(Route { start, end, path });
        }
    }
    None
}

fn search(
    grid: &ObstacleGrid,
    start: Position,
    end: Position,
    settings: &CorridorSettings,
    session: &mut PathfindingSession,
) -> Option<Vec<Position>> {
    let path = session.find_path(grid, start, end, &PathOptions::cardinal());
    if path.is_empty() {
        return None;
    }
    Some(smooth_path(&path, grid, settings.path_smoothing_factor))
}

/// Seeded boundary cell of `region` among the quarter of boundary cells
/// nearest to `toward`.
fn pick_anchor(region: &Region, toward: Position, rng: &mut StdRng) -> Option<Position> {
    let mut cells = region.boundary_positions();
    if cells.is_empty() {
        return None;
    }
    cells.sort_by_key(|&cell| (cell.distance_squared(toward), cell.y, cell.x));
    let pool = (cells.len() / 4).max(1);
    Some(cells[rng.gen_range(0..pool)])
}

/// Rebuilds room connections and doorways from the corridor list.
fn apply_connections(rooms: &mut [Room], corridors: &[Corridor]) {
    let index: HashMap<u32, usize> = rooms
        .iter()
        .enumerate()
        .map(|(index, room)| (room.id, index))
        .collect();
    for room in rooms.iter_mut() {
        room.connections.clear();
        room.doorways.clear();
    }

    for corridor in corridors {
        let (Some(&a), Some(&b)) = (index.get(&corridor.room_a), index.get(&corridor.room_b)) else {
            continue;
        };
        rooms[a].add_connection(corridor.room_b);
        rooms[b].add_connection(corridor.room_a);
        if rooms[a].bounds.is_border(corridor.start) {
            rooms[a].add_doorway(corridor.start);
        }
        if rooms[b].bounds.is_border(corridor.end) {
            rooms[b].add_doorway(corridor.end);
        }
    }
}
