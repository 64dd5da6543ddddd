//! # Generation Module
//!
//! Procedural layout generation: partitioned rooms, room classification and
//! the corridor network.
//!
//! Every stage is a pure function of its inputs and a seed. Stages that need
//! randomness build their own `StdRng` from a seed (or a sub-seed derived
//! with [`crate::utils::derive_seed`]); no generator is ever shared between
//! calls.

pub mod classification;
pub mod connectivity;
pub mod corridors;
pub mod events;
pub mod overrides;
pub mod partition;
pub mod pipeline;
pub mod rooms;

pub use classification::*;
pub use connectivity::*;
pub use corridors::*;
pub use events::*;
pub use overrides::*;
pub use partition::*;
pub use pipeline::*;
pub use rooms::*;

use crate::geometry::{Position, Region};
use crate::{config, FloorplanError, FloorplanResult};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Configuration for procedural generation.
///
/// Deserializes from JSON with every field optional; missing fields fall
/// back to [`GenerationSettings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Region the partition tree subdivides; every room lies inside it
    pub bounds: Region,
    pub partition: PartitionSettings,
    pub corridor: CorridorSettings,
    pub classification: ClassificationSettings,
}

/// Partition tree and room inset parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionSettings {
    /// Smallest side a partition may be split down to
    pub min_partition_size: u32,
    /// Depth at which splitting always stops
    pub max_depth: u32,
    /// How the split axis is chosen
    pub split_policy: SplitPolicy,
    /// Maximum offset of the split line from the midpoint, as a fraction of the side
    pub split_variation: f64,
    /// Chance that any node stops splitting early (0.0 to 1.0)
    pub stop_probability: f64,
    /// Room size relative to its leaf (0.0 exclusive to 1.0)
    pub room_inset_ratio: f64,
    /// Center rooms in their leaf instead of jittering them
    pub center_rooms: bool,
    /// Jitter strength as a fraction of the free space around a room
    pub position_variation: f64,
}

/// Corridor builder parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorSettings {
    /// Strength of corner smoothing after waypoint reduction (0.0 to 1.0)
    pub path_smoothing_factor: f64,
    /// Width of backbone corridors
    pub primary_width: u32,
    /// Width of branch and repair corridors
    pub secondary_width: u32,
    /// Boundary-point attempts per corridor before giving up
    pub max_route_attempts: u32,
    /// Free cells added around the rooms of each obstacle grid
    pub grid_margin: u32,
    /// Run the intersection and re-smoothing pass
    pub optimize: bool,
    /// Number of cached search results per generation call
    pub cache_capacity: usize,
}

/// Room classification parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationSettings {
    pub rules: ClassificationRules,
    /// Classification used when no rule qualifies
    #[serde(alias = "default")]
    pub default_classification: RoomClassification,
    /// Probability of a weighted pick among the best candidates instead of
    /// always taking the top scorer (0.0 to 1.0)
    pub randomness_factor: f64,
    /// Designer overrides keyed by room id
    pub overrides: BTreeMap<u32, RoomClassification>,
}

impl GenerationSettings {
    /// Creates settings covering `bounds` with default parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan::{GenerationSettings, Region};
    ///
    /// let settings = GenerationSettings::new(Region::new(0, 0, 100, 100).unwrap());
    /// assert!(settings.validate().is_ok());
    /// ```
    pub fn new(bounds: Region) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    /// Creates settings for testing with smaller, shallower layouts.
    pub fn for_testing() -> Self {
        Self {
            bounds: Region {
                x: 0,
                y: 0,
                width: 60,
                height: 40,
            },
            partition: PartitionSettings {
                min_partition_size: 8,
                max_depth: 4,
                stop_probability: 0.0,
                ..PartitionSettings::default()
            },
            ..Self::default()
        }
    }

    /// Parses settings from JSON and validates them.
    pub fn from_json_str(json: &str) -> FloorplanResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file and validates them.
    pub fn from_json_file(path: impl AsRef<Path>) -> FloorplanResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes the settings as pretty-printed JSON.
    pub fn to_json(&self) -> FloorplanResult<String> {
        serde_json::to_string_pretty(self).map_err(FloorplanError::from)
    }

    /// Checks every parameter, reporting the first problem found.
    pub fn validate(&self) -> FloorplanResult<()> {
        let invalid = |message: String| Err(FloorplanError::InvalidSettings(message));

        if self.bounds.width < config::MIN_ROOM_SIZE || self.bounds.height < config::MIN_ROOM_SIZE {
            return invalid(format!(
                "map bounds {}x{} cannot hold a {}x{} room",
                self.bounds.width,
                self.bounds.height,
                config::MIN_ROOM_SIZE,
                config::MIN_ROOM_SIZE
            ));
        }
        if self.bounds.width > config::MAX_MAP_DIMENSION
            || self.bounds.height > config::MAX_MAP_DIMENSION
        {
            return invalid(format!(
                "map bounds {}x{} exceed the limit of {}",
                self.bounds.width,
                self.bounds.height,
                config::MAX_MAP_DIMENSION
            ));
        }
        let reach = i64::from(config::MAX_MAP_DIMENSION + config::MAX_GRID_MARGIN);
        let fits = |origin: i32| {
            let origin = i64::from(origin);
            origin - reach >= i64::from(i32::MIN) && origin + 2 * reach <= i64::from(i32::MAX)
        };
        if !fits(self.bounds.x) || !fits(self.bounds.y) {
            return invalid(format!(
                "map origin ({}, {}) is too far from zero",
                self.bounds.x, self.bounds.y
            ));
        }

        let partition = &self.partition;
        if partition.min_partition_size < config::MIN_ROOM_SIZE {
            return invalid(format!(
                "min_partition_size {} is below the minimum room size {}",
                partition.min_partition_size,
                config::MIN_ROOM_SIZE
            ));
        }
        if partition.max_depth > config::MAX_PARTITION_DEPTH {
            return invalid(format!(
                "max_depth {} exceeds the limit of {}",
                partition.max_depth,
                config::MAX_PARTITION_DEPTH
            ));
        }
        if !(0.0..0.5).contains(&partition.split_variation) {
            return invalid(format!(
                "split_variation {} must be in [0, 0.5)",
                partition.split_variation
            ));
        }
        if !(0.0..=1.0).contains(&partition.stop_probability) {
            return invalid(format!(
                "stop_probability {} must be in [0, 1]",
                partition.stop_probability
            ));
        }
        if !(partition.room_inset_ratio > 0.0 && partition.room_inset_ratio <= 1.0) {
            return invalid(format!(
                "room_inset_ratio {} must be in (0, 1]",
                partition.room_inset_ratio
            ));
        }
        if !(0.0..=1.0).contains(&partition.position_variation) {
            return invalid(format!(
                "position_variation {} must be in [0, 1]",
                partition.position_variation
            ));
        }

        let corridor = &self.corridor;
        if !(0.0..=1.0).contains(&corridor.path_smoothing_factor) {
            return invalid(format!(
                "path_smoothing_factor {} must be in [0, 1]",
                corridor.path_smoothing_factor
            ));
        }
        if corridor.primary_width == 0 || corridor.secondary_width == 0 {
            return invalid("corridor widths must be positive".to_string());
        }
        if corridor.max_route_attempts == 0 {
            return invalid("max_route_attempts must be at least 1".to_string());
        }
        if corridor.grid_margin > config::MAX_GRID_MARGIN {
            return invalid(format!(
                "grid_margin {} exceeds the limit of {}",
                corridor.grid_margin,
                config::MAX_GRID_MARGIN
            ));
        }

        let classification = &self.classification;
        if !(0.0..=1.0).contains(&classification.randomness_factor) {
            return invalid(format!(
                "randomness_factor {} must be in [0, 1]",
                classification.randomness_factor
            ));
        }
        if !classification.default_classification.is_assignable() {
            return invalid("default_classification cannot be Unassigned".to_string());
        }
        classification.rules.validate()?;

        Ok(())
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            bounds: Region {
                x: 0,
                y: 0,
                width: config::DEFAULT_MAP_WIDTH,
                height: config::DEFAULT_MAP_HEIGHT,
            },
            partition: PartitionSettings::default(),
            corridor: CorridorSettings::default(),
            classification: ClassificationSettings::default(),
        }
    }
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            min_partition_size: 10,
            max_depth: 5,
            split_policy: SplitPolicy::LongerAxis,
            split_variation: 0.2,
            stop_probability: 0.1,
            room_inset_ratio: 0.75,
            center_rooms: false,
            position_variation: 0.5,
        }
    }
}

impl Default for CorridorSettings {
    fn default() -> Self {
        Self {
            path_smoothing_factor: 0.5,
            primary_width: config::PRIMARY_CORRIDOR_WIDTH,
            secondary_width: config::SECONDARY_CORRIDOR_WIDTH,
            max_route_attempts: config::MAX_ROUTE_ATTEMPTS,
            grid_margin: 4,
            optimize: true,
            cache_capacity: crate::utils::DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            rules: ClassificationRules::office_defaults(),
            default_classification: RoomClassification::Office,
            randomness_factor: 1.0,
            overrides: BTreeMap::new(),
        }
    }
}

/// Semantic purpose of a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum RoomClassification {
    /// Not yet classified
    #[default]
    Unassigned,
    /// Entrance hall; every floor needs one
    Lobby,
    /// The primary office; every floor needs one
    ExecutiveOffice,
    /// Standard private office
    Office,
    /// Shared desk area
    OpenOffice,
    /// Meeting room
    ConferenceRoom,
    /// Kitchen or rest area
    BreakRoom,
    /// Supply and archive space
    Storage,
}

impl RoomClassification {
    /// Every classification a room may end up with.
    pub const ASSIGNABLE: [RoomClassification; 7] = [
        RoomClassification::Lobby,
        RoomClassification::ExecutiveOffice,
        RoomClassification::Office,
        RoomClassification::OpenOffice,
        RoomClassification::ConferenceRoom,
        RoomClassification::BreakRoom,
        RoomClassification::Storage,
    ];

    /// Whether this is a real room type rather than the unassigned marker.
    pub fn is_assignable(self) -> bool {
        self != RoomClassification::Unassigned
    }

    pub fn name(self) -> &'static str {
        match self {
            RoomClassification::Unassigned => "Unassigned",
            RoomClassification::Lobby => "Lobby",
            RoomClassification::ExecutiveOffice => "ExecutiveOffice",
            RoomClassification::Office => "Office",
            RoomClassification::OpenOffice => "OpenOffice",
            RoomClassification::ConferenceRoom => "ConferenceRoom",
            RoomClassification::BreakRoom => "BreakRoom",
            RoomClassification::Storage => "Storage",
        }
    }
}

impl fmt::Display for RoomClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoomClassification {
    type Err = FloorplanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        std::iter::once(RoomClassification::Unassigned)
            .chain(RoomClassification::ASSIGNABLE)
            .find(|classification| classification.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| FloorplanError::InvalidOverride(format!("unknown room type '{trimmed}'")))
    }
}

/// One playable space of the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Sequential identifier, equal to the room's index in its layout
    pub id: u32,
    /// Cells covered by the room, walls included
    pub bounds: Region,
    pub classification: RoomClassification,
    /// Rooms reachable through a corridor attached to this room
    pub connections: BTreeSet<u32>,
    /// Boundary cells where corridors attach
    pub doorways: Vec<Position>,
    /// Partition leaf the room was cut from, if any
    pub leaf: Option<NodeId>,
    /// Depth of that leaf in the partition tree
    pub depth: u32,
}

impl Room {
    /// Creates an unclassified, unconnected room.
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan::{Region, Room, RoomClassification};
    ///
    /// let room = Room::new(1, Region::new(5, 5, 10, 8).unwrap());
    /// assert_eq!(room.id, 1);
    /// assert_eq!(room.area(), 80);
    /// assert_eq!(room.classification, RoomClassification::Unassigned);
    /// ```
    pub fn new(id: u32, bounds: Region) -> Self {
        Self {
            id,
            bounds,
            classification: RoomClassification::Unassigned,
            connections: BTreeSet::new(),
            doorways: Vec::new(),
            leaf: None,
            depth: 0,
        }
    }

    /// Records the partition leaf this room came from.
    pub fn with_source(mut self, leaf: NodeId, depth: u32) -> Self {
        self.leaf = Some(leaf);
        self.depth = depth;
        self
    }

    pub fn area(&self) -> u64 {
        self.bounds.area()
    }

    pub fn center(&self) -> Position {
        self.bounds.center()
    }

    pub fn width(&self) -> u32 {
        self.bounds.width
    }

    pub fn height(&self) -> u32 {
        self.bounds.height
    }

    pub fn is_classified(&self) -> bool {
        self.classification.is_assignable()
    }

    /// Checks if this room shares any cell with another room.
    pub fn overlaps(&self, other: &Room) -> bool {
        self.bounds.intersects(&other.bounds)
    }

    /// Adds a connection to another room. Self-connections are ignored.
    pub fn add_connection(&mut self, room_id: u32) {
        if room_id != self.id {
            self.connections.insert(room_id);
        }
    }

    pub fn remove_connection(&mut self, room_id: u32) {
        self.connections.remove(&room_id);
    }

    /// Records a doorway cell, ignoring duplicates.
    pub fn add_doorway(&mut self, pos: Position) {
        if !self.doorways.contains(&pos) {
            self.doorways.push(pos);
        }
    }
}

/// Role of a corridor in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorridorKind {
    /// Backbone link between two core rooms
    Primary,
    /// Branch attaching a non-core room to the network
    Secondary,
    /// Extra link added to join disconnected components
    Repair,
}

/// One connection between two rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    pub id: u32,
    pub room_a: u32,
    /// For branches attached to another corridor, a room served by that corridor
    pub room_b: u32,
    pub start: Position,
    pub end: Position,
    /// Cells across; 5 for primary and 3 for secondary corridors by default
    pub width: u32,
    pub kind: CorridorKind,
    /// Corridor this one branches off, when it ends on a corridor cell
    pub attached_to: Option<u32>,
    /// Center-line cells from `start` to `end`, inclusive
    pub path: Vec<Position>,
}

impl Corridor {
    /// Walking length of the center line.
    pub fn length(&self) -> f64 {
        crate::utils::path_cost(&self.path)
    }

    pub fn connects(&self, room_id: u32) -> bool {
        self.room_a == room_id || self.room_b == room_id
    }

    /// Whether the path's endpoints agree with `start` and `end`.
    pub fn endpoints_match(&self) -> bool {
        self.path.first() == Some(&self.start) && self.path.last() == Some(&self.end)
    }
}

/// Trait for procedural generators.
///
/// Generators take their configuration and a caller-owned random number
/// generator, which keeps them free of hidden state.
pub trait Generator<T> {
    /// Generates content using the provided settings and random number generator.
    fn generate(&self, settings: &GenerationSettings, rng: &mut StdRng) -> FloorplanResult<T>;

    /// Checks generated content against the structural invariants.
    fn validate(&self, content: &T, settings: &GenerationSettings) -> ValidationReport;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

/// Utility functions for generation algorithms.
pub mod utils {
    use super::*;
    use rand::SeedableRng;

    /// Sub-seed stream for room classification.
    pub const CLASSIFICATION_STREAM: u64 = 1;
    /// Sub-seed stream for corridor generation.
    pub const CORRIDOR_STREAM: u64 = 2;

    /// Creates a seeded random number generator.
    pub fn create_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    /// Creates the generator for one pipeline stage.
    pub fn stage_rng(seed: u64, stream: u64) -> StdRng {
        create_rng(crate::utils::derive_seed(seed, stream))
    }

    /// Boundary cells of `a` and `b` that face each other: the cell of each
    /// room nearest the other room's center, ties going to the earlier
    /// cell in boundary order.
    pub fn facing_boundary_points(a: &Region, b: &Region) -> Option<(Position, Position)> {
        let nearest = |region: &Region, target: Position| {
            region
                .boundary_positions()
                .into_iter()
                .min_by_key(|&cell| cell.distance_squared(target))
        };
        Some((nearest(a, b.center())?, nearest(b, a.center())?))
    }

    /// Sum of room areas.
    pub fn total_room_area(rooms: &[Room]) -> u64 {
        rooms.iter().map(Room::area).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_settings_defaults_are_valid() {
        let settings = GenerationSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.corridor.primary_width, 5);
        assert_eq!(settings.corridor.secondary_width, 3);
        assert!(GenerationSettings::for_testing().validate().is_ok());
    }

    #[test]
    fn test_generation_settings_rejects_bad_values() {
        let mut settings = GenerationSettings::default();
        settings.partition.min_partition_size = 2;
        assert!(matches!(
            settings.validate(),
            Err(FloorplanError::InvalidSettings(_))
        ));

        let mut settings = GenerationSettings::default();
        settings.partition.room_inset_ratio = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = GenerationSettings::default();
        settings.bounds.width = 0;
        assert!(settings.validate().is_err());

        let mut settings = GenerationSettings::default();
        settings.classification.default_classification = RoomClassification::Unassigned;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_generation_settings_rejects_oversized_grids() {
        let mut settings = GenerationSettings::default();
        settings.corridor.grid_margin = u32::MAX;
        assert!(matches!(
            settings.validate(),
            Err(FloorplanError::InvalidSettings(_))
        ));
        assert!(FloorPlanGenerator::new().generate_from_seed(&settings, 1).is_err());

        settings.corridor.grid_margin = config::MAX_GRID_MARGIN;
        assert!(settings.validate().is_ok());

        let mut settings = GenerationSettings::default();
        settings.bounds.width = u32::MAX;
        assert!(settings.validate().is_err());

        let mut settings = GenerationSettings::default();
        settings.bounds.x = i32::MAX - 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_generation_settings_json_uses_defaults_for_missing_fields() {
        let settings = GenerationSettings::from_json_str(
            r#"{ "bounds": { "x": 0, "y": 0, "width": 80, "height": 50 },
                 "partition": { "max_depth": 3 } }"#,
        )
        .unwrap();
        assert_eq!(settings.bounds.width, 80);
        assert_eq!(settings.partition.max_depth, 3);
        assert_eq!(settings.partition.min_partition_size, 10);
        assert_eq!(settings.corridor, CorridorSettings::default());
    }

    #[test]
    fn test_generation_settings_json_round_trip() {
        let settings = GenerationSettings::for_testing();
        let json = settings.to_json().unwrap();
        assert_eq!(GenerationSettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn test_room_classification_parsing() {
        assert_eq!(
            "conferenceroom".parse::<RoomClassification>().unwrap(),
            RoomClassification::ConferenceRoom
        );
        assert_eq!(
            "Unassigned".parse::<RoomClassification>().unwrap(),
            RoomClassification::Unassigned
        );
        assert!("Ballroom".parse::<RoomClassification>().is_err());
        assert!(!RoomClassification::ASSIGNABLE.contains(&RoomClassification::Unassigned));
    }

    #[test]
    fn test_room_connections() {
        let mut room = Room::new(1, Region::new(5, 5, 10, 8).unwrap());
        assert!(room.connections.is_empty());

        room.add_connection(2);
        room.add_connection(3);
        room.add_connection(2);
        room.add_connection(1);
        assert_eq!(room.connections.len(), 2);

        room.remove_connection(2);
        assert!(!room.connections.contains(&2));
        assert!(room.connections.contains(&3));
    }

    #[test]
    fn test_room_doorways_are_unique() {
        let mut room = Room::new(0, Region::new(0, 0, 6, 6).unwrap());
        room.add_doorway(Position::new(0, 3));
        room.add_doorway(Position::new(0, 3));
        assert_eq!(room.doorways.len(), 1);
    }

    #[test]
    fn test_room_overlap() {
        let room1 = Room::new(1, Region::new(5, 5, 10, 8).unwrap());
        let room2 = Room::new(2, Region::new(10, 8, 6, 6).unwrap());
        let room3 = Room::new(3, Region::new(20, 20, 5, 5).unwrap());

        assert!(room1.overlaps(&room2));
        assert!(room2.overlaps(&room1));
        assert!(!room1.overlaps(&room3));
    }

    #[test]
    fn test_corridor_length_and_endpoints() {
        let path = vec![Position::new(0, 0), Position::new(1, 0), Position::new(1, 1)];
        let corridor = Corridor {
            id: 0,
            room_a: 0,
            room_b: 1,
            start: Position::new(0, 0),
            end: Position::new(1, 1),
            width: 3,
            kind: CorridorKind::Secondary,
            attached_to: None,
            path,
        };
        assert_eq!(corridor.length(), 2.0);
        assert!(corridor.endpoints_match());
        assert!(corridor.connects(1));
        assert!(!corridor.connects(2));
    }

    #[test]
    fn test_facing_boundary_points() {
        let a = Region::new(0, 0, 5, 5).unwrap();
        let b = Region::new(20, 0, 5, 5).unwrap();
        let (pa, pb) = utils::facing_boundary_points(&a, &b).unwrap();
        assert_eq!(pa, Position::new(4, 2));
        assert_eq!(pb, Position::new(20, 2));
    }

    #[test]
    fn test_stage_rngs_are_independent() {
        use rand::Rng;
        let mut a = utils::stage_rng(7, utils::CLASSIFICATION_STREAM);
        let mut b = utils::stage_rng(7, utils::CORRIDOR_STREAM);
        let xs: Vec<u64> = (0..4).map(|_| a.gen()).collect();
        let ys: Vec<u64> = (0..4).map(|_| b.gen()).collect();
        assert_ne!(xs, ys);
    }
}
