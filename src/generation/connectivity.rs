//! Room adjacency through corridors.

use super::Corridor;
use ::pathfinding::prelude::bfs_reach;
use std::collections::{BTreeMap, BTreeSet};

/// Undirected graph of rooms joined by corridors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomGraph {
    adjacency: BTreeMap<u32, BTreeSet<u32>>,
}

impl RoomGraph {
    /// Builds the graph over `room_ids` from corridor endpoints. Corridors
    /// naming unknown rooms add those rooms as nodes.
    pub fn from_corridors(room_ids: impl IntoIterator<Item = u32>, corridors: &[Corridor]) -> Self {
        let mut adjacency: BTreeMap<u32, BTreeSet<u32>> = room_ids
            .into_iter()
            .map(|id| (id, BTreeSet::new()))
            .collect();
        for corridor in corridors {
            adjacency.entry(corridor.room_a).or_default();
            adjacency.entry(corridor.room_b).or_default();
            if corridor.room_a != corridor.room_b {
                if let Some(edges) = adjacency.get_mut(&corridor.room_a) {
                    edges.insert(corridor.room_b);
                }
                if let Some(edges) = adjacency.get_mut(&corridor.room_b) {
                    edges.insert(corridor.room_a);
                }
            }
        }
        Self { adjacency }
    }

    pub fn room_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn neighbors(&self, room_id: u32) -> impl Iterator<Item = u32> + '_ {
        self.adjacency.get(&room_id).into_iter().flatten().copied()
    }

    /// Rooms reachable from `start`, itself included, in breadth-first order.
    pub fn reachable_from(&self, start: u32) -> Vec<u32> {
        if !self.adjacency.contains_key(&start) {
            return Vec::new();
        }
        bfs_reach(start, |&id| self.neighbors(id).collect::<Vec<_>>()).collect()
    }

    /// Connected components, each sorted by room id, ordered by their
    /// smallest room id.
    pub fn components(&self) -> Vec<Vec<u32>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();
        for &id in self.adjacency.keys() {
            if seen.contains(&id) {
                continue;
            }
            let mut component = self.reachable_from(id);
            component.sort_unstable();
            seen.extend(component.iter().copied());
            components.push(component);
        }
        components
    }

    /// True when every room reaches every other room. An empty graph counts
    /// as connected.
    pub fn is_connected(&self) -> bool {
        match self.adjacency.keys().next() {
            Some(&first) => self.reachable_from(first).len() == self.adjacency.len(),
            None => true,
        }
    }
}
