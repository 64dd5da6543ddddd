//! # Floorplan
//!
//! Seeded procedural layout generation for office-style levels.
//!
//! ## Architecture Overview
//!
//! A floor plan is built in three tightly coupled stages, each a pure
//! function of its inputs and a seed:
//!
//! - **Partitioning**: a binary partition tree cuts the map into leaves and
//!   every leaf yields at most one room
//! - **Classification**: rule-based scoring assigns a room type to every
//!   room, with designer overrides taking precedence
//! - **Corridors**: a spanning-tree backbone between core rooms, branch
//!   corridors for the rest, and a repair pass that guarantees every room
//!   is reachable
//!
//! The grid pathfinding the corridor builder relies on lives in [`utils`]
//! and knows nothing about rooms.
//!
//! ```
//! use floorplan::{FloorPlanGenerator, GenerationSettings, Region};
//!
//! let settings = GenerationSettings::new(Region::new(0, 0, 100, 100).unwrap());
//! let plan = FloorPlanGenerator::new().generate_from_seed(&settings, 12345).unwrap();
//! assert!(!plan.rooms.is_empty());
//! assert!(plan.validate(&settings).is_valid());
//! ```

pub mod generation;
pub mod geometry;
pub mod utils;

// Core module re-exports
pub use generation::*;
pub use geometry::*;
pub use utils::*;

/// Core error type for floor plan generation.
#[derive(thiserror::Error, Debug)]
pub enum FloorplanError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Settings are out of range or inconsistent
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// A required table or input is absent
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// Designer override names something that is not a room type
    #[error("Invalid override: {0}")]
    InvalidOverride(String),

    /// Caller passed unusable data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

/// Result type used throughout the floorplan codebase.
pub type FloorplanResult<T> = Result<T, FloorplanError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Generation constants.
pub mod config {
    /// Default map width in cells
    pub const DEFAULT_MAP_WIDTH: u32 = 100;

    /// Default map height in cells
    pub const DEFAULT_MAP_HEIGHT: u32 = 100;

    /// Smallest room side, walls included
    pub const MIN_ROOM_SIZE: u32 = 3;

    /// Largest map side the settings accept
    pub const MAX_MAP_DIMENSION: u32 = 16_384;

    /// Widest obstacle-grid margin the settings accept
    pub const MAX_GRID_MARGIN: u32 = 64;

    /// Deepest partition tree the settings accept
    pub const MAX_PARTITION_DEPTH: u32 = 24;

    /// Width of backbone corridors
    pub const PRIMARY_CORRIDOR_WIDTH: u32 = 5;

    /// Width of branch and repair corridors
    pub const SECONDARY_CORRIDOR_WIDTH: u32 = 3;

    /// Boundary-point attempts per corridor
    pub const MAX_ROUTE_ATTEMPTS: u32 = 3;

    /// Fraction of rooms that anchor the corridor backbone
    pub const CORE_ROOM_FRACTION: f64 = 0.7;

    /// Candidates kept for the weighted classification pick
    pub const CLASSIFICATION_TOP_CANDIDATES: usize = 3;
}
