//! # Room Extraction
//!
//! Turns partition leaves into rooms. Each room is inset inside its leaf,
//! so containment and pairwise non-overlap hold by construction; the
//! post-hoc [`validate_room_placement`] check exists for layouts that were
//! edited or assembled by other means.

use super::partition::{PartitionStats, PartitionTree};
use super::utils::create_rng;
use super::{GenerationEvent, GenerationSettings, Generator, PartitionSettings, Room, ValidationReport};
use crate::geometry::Region;
use crate::{config, FloorplanResult};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Rooms of one generation call together with the tree they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomLayout {
    /// Rooms in leaf enumeration order; `rooms[i].id == i`
    pub rooms: Vec<Room>,
    /// Kept for debug visualization
    pub tree: PartitionTree,
    pub events: Vec<GenerationEvent>,
    pub stats: RoomStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStats {
    pub partition: PartitionStats,
    pub room_count: usize,
    pub failed_leaves: usize,
    pub total_room_area: u64,
}

/// Room generator using binary space partitioning.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomGenerator;

impl RoomGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generates the room layout for `settings` from a seed.
    ///
    /// The same settings and seed always produce the same rooms in the same
    /// order with the same IDs.
    pub fn generate_rooms(
        &self,
        settings: &GenerationSettings,
        seed: u64,
    ) -> FloorplanResult<RoomLayout> {
        let mut rng = create_rng(seed);
        self.generate(settings, &mut rng)
    }
}

impl Generator<RoomLayout> for RoomGenerator {
    fn generate(
        &self,
        settings: &GenerationSettings,
        rng: &mut StdRng,
    ) -> FloorplanResult<RoomLayout> {
        settings.validate()?;

        let tree = PartitionTree::split(settings.bounds, &settings.partition, rng);
        let (rooms, events) = extract_rooms(&tree, &settings.partition, rng);

        let stats = RoomStats {
            partition: tree.stats(),
            room_count: rooms.len(),
            failed_leaves: events.iter().filter(|event| event.is_failure()).count(),
            total_room_area: super::utils::total_room_area(&rooms),
        };
        debug!(
            "Generated {} rooms from {} leaves ({} failed)",
            stats.room_count, stats.partition.leaf_count, stats.failed_leaves
        );

        Ok(RoomLayout {
            rooms,
            tree,
            events,
            stats,
        })
    }

    fn validate(&self, layout: &RoomLayout, settings: &GenerationSettings) -> ValidationReport {
        let mut report = layout.tree.validate();
        report.merge(validate_room_placement(&layout.rooms, &settings.bounds));

        for room in &layout.rooms {
            let leaf = room.leaf.and_then(|id| layout.tree.node(id));
            match leaf {
                Some(leaf) if leaf.bounds.contains_region(&room.bounds) => {}
                Some(_) => report.error(format!("room {} extends outside its leaf", room.id)),
                None => report.warning(format!("room {} has no source leaf", room.id)),
            }
        }
        report
    }

    fn generator_type(&self) -> &'static str {
        "RoomGenerator"
    }
}

/// Builds one room per usable leaf of `tree`.
///
/// Leaves that cannot hold a minimum-size room are skipped with a
/// [`GenerationEvent::RoomGenerationFailed`]; IDs stay sequential over the
/// rooms actually produced.
pub fn extract_rooms(
    tree: &PartitionTree,
    settings: &PartitionSettings,
    rng: &mut StdRng,
) -> (Vec<Room>, Vec<GenerationEvent>) {
    let mut rooms = Vec::new();
    let mut events = Vec::new();

    for leaf_id in tree.enumerate_leaves() {
        let Some(leaf) = tree.node(leaf_id) else {
            continue;
        };
        match inset_room(&leaf.bounds, settings, rng) {
            Some(bounds) => {
                let id = rooms.len() as u32;
                rooms.push(Room::new(id, bounds).with_source(leaf_id, leaf.depth));
                events.push(GenerationEvent::RoomGenerated {
                    room_id: id,
                    leaf: leaf_id,
                });
            }
            None => {
                let reason = format!(
                    "leaf {}x{} is smaller than the minimum room size",
                    leaf.bounds.width, leaf.bounds.height
                );
                warn!("Skipping leaf {}: {}", leaf_id.index(), reason);
                events.push(GenerationEvent::RoomGenerationFailed {
                    leaf: leaf_id,
                    reason,
                });
            }
        }
    }

    (rooms, events)
}

/// Room rectangle for one leaf, or `None` when the leaf is too small.
fn inset_room(leaf: &Region, settings: &PartitionSettings, rng: &mut StdRng) -> Option<Region> {
    let min = config::MIN_ROOM_SIZE;
    if leaf.width < min || leaf.height < min {
        return None;
    }

    let inset = |side: u32| ((side as f64 * settings.room_inset_ratio).floor() as u32).clamp(min, side);
    let width = inset(leaf.width);
    let height = inset(leaf.height);

    let mut place = |slack: u32| -> i32 {
        let centered = (slack / 2) as i32;
        if settings.center_rooms {
            return centered;
        }
        let jitter = rng.gen_range(-1.0..=1.0) * settings.position_variation * slack as f64 / 2.0;
        (centered + jitter.round() as i32).clamp(0, slack as i32)
    };
    let dx = place(leaf.width - width);
    let dy = place(leaf.height - height);

    Region::new(leaf.x + dx, leaf.y + dy, width, height)
}

/// Post-hoc structural check of a room set.
///
/// Reports overlapping pairs, rooms outside `bounds`, undersized rooms and
/// duplicate IDs as errors.
pub fn validate_room_placement(rooms: &[Room], bounds: &Region) -> ValidationReport {
    let mut report = ValidationReport::new();
    let mut seen: HashSet<u32> = HashSet::new();

    for (index, room) in rooms.iter().enumerate() {
        if !seen.insert(room.id) {
            report.error(format!("room id {} is used more than once", room.id));
        }
        if room.id as usize != index {
            report.warning(format!("room {} is stored at index {}", room.id, index));
        }
        if !bounds.contains_region(&room.bounds) {
            report.error(format!("room {} lies outside the map bounds", room.id));
        }
        if room.width() < config::MIN_ROOM_SIZE || room.height() < config::MIN_ROOM_SIZE {
            report.error(format!(
                "room {} is {}x{}, below the {}x{} minimum",
                room.id,
                room.width(),
                room.height(),
                config::MIN_ROOM_SIZE,
                config::MIN_ROOM_SIZE
            ));
        }
        for other in &rooms[index + 1..] {
            if room.overlaps(other) {
                report.error(format!("rooms {} and {} overlap", room.id, other.id));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FloorplanError;

    fn scenario_settings() -> GenerationSettings {
        let mut settings = GenerationSettings::new(Region::new(0, 0, 100, 100).unwrap());
        settings.partition.min_partition_size = 10;
        settings.partition.max_depth = 5;
        settings
    }

    #[test]
    fn test_room_generation() {
        let settings = scenario_settings();
        let layout = RoomGenerator::new().generate_rooms(&settings, 12345).unwrap();

        assert!(!layout.rooms.is_empty());
        let report = RoomGenerator::new().validate(&layout, &settings);
        assert!(report.is_valid(), "{report}");
        for (index, room) in layout.rooms.iter().enumerate() {
            assert_eq!(room.id as usize, index);
            assert!(room.width() >= 3 && room.height() >= 3);
            assert!(settings.bounds.contains_region(&room.bounds));
        }
        assert_eq!(layout.stats.room_count, layout.rooms.len());
        assert_eq!(
            layout.events.len(),
            layout.stats.partition.leaf_count,
            "one event per leaf"
        );
    }

    #[test]
    fn test_room_generation_is_deterministic() {
        let settings = scenario_settings();
        let generator = RoomGenerator::new();
        let a = generator.generate_rooms(&settings, 77).unwrap();
        let b = generator.generate_rooms(&settings, 77).unwrap();
        assert_eq!(a.rooms, b.rooms);

        let c = generator.generate_rooms(&settings, 78).unwrap();
        assert_ne!(a.tree, c.tree);
    }

    #[test]
    fn test_centered_rooms() {
        let mut settings = scenario_settings();
        settings.partition.center_rooms = true;
        let layout = RoomGenerator::new().generate_rooms(&settings, 5).unwrap();
        for room in &layout.rooms {
            let leaf = layout.tree.node(room.leaf.unwrap()).unwrap().bounds;
            assert_eq!(room.bounds.x - leaf.x, ((leaf.width - room.width()) / 2) as i32);
            assert_eq!(room.bounds.y - leaf.y, ((leaf.height - room.height()) / 2) as i32);
        }
    }

    #[test]
    fn test_invalid_settings_are_fatal() {
        let mut settings = scenario_settings();
        settings.partition.room_inset_ratio = 1.5;
        assert!(matches!(
            RoomGenerator::new().generate_rooms(&settings, 1),
            Err(FloorplanError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_small_leaves_fail_without_aborting() {
        let partition = PartitionSettings {
            min_partition_size: 1,
            max_depth: 3,
            stop_probability: 0.0,
            split_variation: 0.0,
            ..PartitionSettings::default()
        };
        let mut rng = create_rng(11);
        let tree = PartitionTree::split(Region::new(0, 0, 10, 10).unwrap(), &partition, &mut rng);
        let (rooms, events) = extract_rooms(&tree, &partition, &mut rng);

        let failures = events.iter().filter(|event| event.is_failure()).count();
        assert!(failures > 0);
        assert_eq!(rooms.len() + failures, tree.enumerate_leaves().len());
        for (index, room) in rooms.iter().enumerate() {
            assert_eq!(room.id as usize, index);
        }
    }

    #[test]
    fn test_minimum_room_size_floor() {
        let partition = PartitionSettings {
            room_inset_ratio: 0.1,
            center_rooms: true,
            ..PartitionSettings::default()
        };
        let leaf = Region::new(0, 0, 12, 4).unwrap();
        let room = inset_room(&leaf, &partition, &mut create_rng(0)).unwrap();
        assert_eq!((room.width, room.height), (3, 3));
        assert!(leaf.contains_region(&room));
        assert!(inset_room(&Region::new(0, 0, 2, 9).unwrap(), &partition, &mut create_rng(0)).is_none());
    }

    #[test]
    fn test_validate_room_placement_finds_problems() {
        let bounds = Region::new(0, 0, 20, 20).unwrap();
        let rooms = vec![
            Room::new(0, Region::new(0, 0, 6, 6).unwrap()),
            Room::new(0, Region::new(4, 4, 6, 6).unwrap()),
            Room::new(2, Region::new(18, 18, 5, 5).unwrap()),
            Room::new(3, Region::new(10, 0, 2, 8).unwrap()),
        ];
        let report = validate_room_placement(&rooms, &bounds);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("overlap")));
        assert!(report.errors.iter().any(|e| e.contains("more than once")));
        assert!(report.errors.iter().any(|e| e.contains("outside")));
        assert!(report.errors.iter().any(|e| e.contains("minimum")));
    }
}
