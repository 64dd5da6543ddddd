//! # Floor Plan Pipeline
//!
//! Runs room generation, classification and corridor building for one seed.
//! Rooms use the seed directly; classification and corridors use sub-seeds
//! derived from it, so changing one stage's consumption of randomness does
//! not shift the others.

use super::classification::{validate_distribution, ClassificationReport, RoomClassifier};
use super::corridors::{validate_corridors, CorridorGenerator};
use super::overrides::OverrideManager;
use super::partition::PartitionTree;
use super::rooms::{validate_room_placement, RoomGenerator};
use super::utils::{stage_rng, CLASSIFICATION_STREAM, CORRIDOR_STREAM};
use super::{Corridor, GenerationEvent, GenerationSettings, Generator, Room, ValidationReport};
use crate::geometry::Region;
use crate::utils::derive_seed;
use crate::{FloorplanError, FloorplanResult};
use log::info;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Relative tolerance used when checking the room type mix of a plan.
pub const DISTRIBUTION_TOLERANCE: f64 = 0.25;

/// A complete generated level layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorPlan {
    pub seed: u64,
    pub bounds: Region,
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    pub core_rooms: Vec<u32>,
    /// Partition tree the rooms were cut from, for debug views
    pub tree: PartitionTree,
    pub classification: ClassificationReport,
    /// Room and corridor events in generation order
    pub events: Vec<GenerationEvent>,
    pub stats: FloorPlanStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorPlanStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub max_depth: u32,
    pub vertical_splits: usize,
    pub horizontal_splits: usize,
    pub room_count: usize,
    pub corridor_count: usize,
    pub failed_rooms: usize,
    pub failed_corridors: usize,
    pub total_room_area: u64,
    pub total_corridor_length: f64,
}

impl FloorPlan {
    /// Runs every structural check against the plan.
    ///
    /// Distribution skew only produces warnings; broken tiling, overlap,
    /// unassigned rooms and connectivity problems are errors.
    pub fn validate(&self, settings: &GenerationSettings) -> ValidationReport {
        let mut report = self.tree.validate();
        report.merge(validate_room_placement(&self.rooms, &self.bounds));
        report.merge(validate_distribution(
            &self.rooms,
            &settings.classification.rules,
            DISTRIBUTION_TOLERANCE,
        ));
        report.merge(validate_corridors(&self.rooms, &self.corridors, &settings.corridor));
        for classification in &self.classification.unresolved {
            report.warning(format!(
                "required classification {classification} has no eligible room"
            ));
        }
        report
    }

    pub fn room(&self, id: u32) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == id)
    }

    pub fn to_json(&self) -> FloorplanResult<String> {
        serde_json::to_string_pretty(self).map_err(FloorplanError::from)
    }
}

/// Generator for complete floor plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloorPlanGenerator {
    rooms: RoomGenerator,
    corridors: CorridorGenerator,
}

impl FloorPlanGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the plan for `seed`. The same settings and seed always
    /// produce the same plan.
    pub fn generate_from_seed(
        &self,
        settings: &GenerationSettings,
        seed: u64,
    ) -> FloorplanResult<FloorPlan> {
        let layout = self.rooms.generate_rooms(settings, seed)?;
        let mut rooms = layout.rooms;
        if rooms.is_empty() {
            return Err(FloorplanError::GenerationFailed(
                "partitioning produced no usable rooms".to_string(),
            ));
        }

        let overrides = OverrideManager::from_map(&settings.classification.overrides)?;
        let classifier = RoomClassifier::from_settings(&settings.classification);
        let classification = classifier.classify(
            &mut rooms,
            &settings.bounds,
            &settings.classification.rules,
            &overrides,
            &mut stage_rng(seed, CLASSIFICATION_STREAM),
        )?;

        let network =
            self.corridors
                .connect_rooms(&mut rooms, settings, derive_seed(seed, CORRIDOR_STREAM))?;

        let mut events = layout.events;
        events.extend(network.events);

        let partition = layout.stats.partition;
        let stats = FloorPlanStats {
            node_count: partition.node_count,
            leaf_count: partition.leaf_count,
            max_depth: partition.max_depth,
            vertical_splits: partition.vertical_splits,
            horizontal_splits: partition.horizontal_splits,
            room_count: rooms.len(),
            corridor_count: network.corridors.len(),
            failed_rooms: layout.stats.failed_leaves,
            failed_corridors: network.stats.failed,
            total_room_area: layout.stats.total_room_area,
            total_corridor_length: network.stats.total_length,
        };
        info!(
            "Floor plan {}: {} rooms, {} corridors, depth {}",
            seed, stats.room_count, stats.corridor_count, stats.max_depth
        );

        Ok(FloorPlan {
            seed,
            bounds: settings.bounds,
            rooms,
            corridors: network.corridors,
            core_rooms: network.core_rooms,
            tree: layout.tree,
            classification,
            events,
            stats,
        })
    }
}

impl Generator<FloorPlan> for FloorPlanGenerator {
    fn generate(&self, settings: &GenerationSettings, rng: &mut StdRng) -> FloorplanResult<FloorPlan> {
        let seed: u64 = rng.gen();
        self.generate_from_seed(settings, seed)
    }

    fn validate(&self, plan: &FloorPlan, settings: &GenerationSettings) -> ValidationReport {
        plan.validate(settings)
    }

    fn generator_type(&self) -> &'static str {
        "FloorPlanGenerator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::utils::create_rng;
    use crate::generation::{ClassificationRules, RoomClassification, RoomTypeRule};

    fn settings() -> GenerationSettings {
        let mut settings = GenerationSettings::new(Region::new(0, 0, 100, 100).unwrap());
        settings.partition.min_partition_size = 10;
        settings.partition.max_depth = 5;
        settings
    }

    #[test]
    fn test_floor_plan_generation() {
        let settings = settings();
        let plan = FloorPlanGenerator::new().generate_from_seed(&settings, 12345).unwrap();

        assert!(!plan.rooms.is_empty());
        assert!(plan.rooms.iter().all(Room::is_classified));
        let report = plan.validate(&settings);
        assert!(report.is_valid(), "{report}");
        assert_eq!(plan.stats.room_count, plan.rooms.len());
        assert_eq!(plan.stats.corridor_count, plan.corridors.len());
    }

    #[test]
    fn test_floor_plan_is_deterministic() {
        let settings = settings();
        let generator = FloorPlanGenerator::new();
        let a = generator.generate_from_seed(&settings, 2024).unwrap();
        let b = generator.generate_from_seed(&settings, 2024).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_generator_trait() {
        let settings = GenerationSettings::for_testing();
        let generator = FloorPlanGenerator::new();
        let plan = generator.generate(&settings, &mut create_rng(7)).unwrap();
        assert!(generator.validate(&plan, &settings).is_valid());
        assert_eq!(generator.generator_type(), "FloorPlanGenerator");
    }

    #[test]
    fn test_settings_overrides_are_applied() {
        let mut settings = settings();
        settings
            .classification
            .overrides
            .insert(0, RoomClassification::Storage);
        let plan = FloorPlanGenerator::new().generate_from_seed(&settings, 5).unwrap();
        assert_eq!(plan.rooms[0].classification, RoomClassification::Storage);
    }

    #[test]
    fn test_invalid_override_in_settings_is_fatal() {
        let mut settings = settings();
        settings
            .classification
            .overrides
            .insert(0, RoomClassification::Unassigned);
        assert!(matches!(
            FloorPlanGenerator::new().generate_from_seed(&settings, 5),
            Err(FloorplanError::InvalidOverride(_))
        ));
    }

    #[test]
    fn test_unresolved_required_classification_is_reported() {
        let mut settings = settings();
        let mut rules = ClassificationRules::new();
        rules.insert(
            RoomClassification::Office,
            RoomTypeRule::new((3, 3), (100, 100), (8, 8)).with_target(100.0),
        );
        rules.insert(
            RoomClassification::Lobby,
            RoomTypeRule::new((200, 200), (300, 300), (250, 250))
                .with_target(0.0)
                .required(),
        );
        settings.classification.rules = rules;

        let plan = FloorPlanGenerator::new().generate_from_seed(&settings, 12345).unwrap();
        assert_eq!(plan.classification.unresolved, vec![RoomClassification::Lobby]);

        let report = plan.validate(&settings);
        assert!(report.is_valid(), "{report}");
        assert!(report
            .warnings
            .iter()
            .any(|warning| warning.contains("required classification Lobby")));
    }

    #[test]
    fn test_floor_plan_serializes() {
        let plan = FloorPlanGenerator::new()
            .generate_from_seed(&GenerationSettings::for_testing(), 3)
            .unwrap();
        let json = plan.to_json().unwrap();
        let restored: FloorPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.rooms, plan.rooms);
        assert_eq!(restored.corridors.len(), plan.corridors.len());
    }
}
