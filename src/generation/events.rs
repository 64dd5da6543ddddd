//! Generation events and validation reports.
//!
//! Stages return the events they produce alongside their results, in the
//! order the items were generated. Events are informational; nothing in the
//! pipeline branches on them.

use super::partition::NodeId;
use super::CorridorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One per-item outcome of a generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenerationEvent {
    RoomGenerated {
        room_id: u32,
        leaf: NodeId,
    },
    RoomGenerationFailed {
        leaf: NodeId,
        reason: String,
    },
    CorridorGenerated {
        corridor_id: u32,
        room_a: u32,
        room_b: u32,
        kind: CorridorKind,
    },
    CorridorGenerationFailed {
        room_a: u32,
        room_b: u32,
        reason: String,
    },
}

impl GenerationEvent {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            GenerationEvent::RoomGenerationFailed { .. }
                | GenerationEvent::CorridorGenerationFailed { .. }
        )
    }
}

impl fmt::Display for GenerationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationEvent::RoomGenerated { room_id, leaf } => {
                write!(f, "room {room_id} generated from leaf {}", leaf.index())
            }
            GenerationEvent::RoomGenerationFailed { leaf, reason } => {
                write!(f, "leaf {} produced no room: {reason}", leaf.index())
            }
            GenerationEvent::CorridorGenerated {
                corridor_id,
                room_a,
                room_b,
                kind,
            } => write!(
                f,
                "{kind:?} corridor {corridor_id} joins rooms {room_a} and {room_b}"
            ),
            GenerationEvent::CorridorGenerationFailed {
                room_a,
                room_b,
                reason,
            } => write!(f, "no corridor between rooms {room_a} and {room_b}: {reason}"),
        }
    }
}

/// Ordered errors and warnings from a structural check.
///
/// Errors mean an invariant is broken; warnings flag acceptable but
/// unusual output such as a skewed room type distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Appends another report's findings after this one's.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// True when no errors were recorded. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} errors, {} warnings",
            self.errors.len(),
            self.warnings.len()
        )?;
        for error in &self.errors {
            write!(f, "\n  error: {error}")?;
        }
        for warning in &self.warnings {
            write!(f, "\n  warning: {warning}")?;
        }
        Ok(())
    }
}
