//! # Utilities Module
//!
//! Grid pathfinding and numeric helpers. Nothing in here knows about rooms;
//! everything works on plain regions, positions and obstacle grids.

pub mod cache;
pub mod math;
pub mod obstacles;
pub mod pathfinding;
pub mod smoothing;

pub use self::cache::*;
pub use self::math::*;
pub use self::obstacles::*;
pub use self::pathfinding::*;
pub use self::smoothing::*;
