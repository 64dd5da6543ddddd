//! Designer overrides for room classification.
//!
//! An override pins a room to a classification before any scoring happens.
//! Targets are validated on insertion, so the classifier can apply them
//! verbatim.

use super::RoomClassification;
use crate::{FloorplanError, FloorplanResult};
use std::collections::BTreeMap;

/// Validated room id to classification map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideManager {
    overrides: BTreeMap<u32, RoomClassification>,
}

impl OverrideManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a manager from a raw map, as loaded from configuration.
    pub fn from_map(map: &BTreeMap<u32, RoomClassification>) -> FloorplanResult<Self> {
        let mut manager = Self::new();
        for (&room_id, &classification) in map {
            manager.set_override(room_id, classification)?;
        }
        Ok(manager)
    }

    /// Pins `room_id` to `classification`, replacing any earlier override.
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan::{OverrideManager, RoomClassification};
    ///
    /// let mut overrides = OverrideManager::new();
    /// overrides.set_override(3, RoomClassification::Lobby).unwrap();
    /// assert!(overrides.set_override(4, RoomClassification::Unassigned).is_err());
    /// assert_eq!(overrides.get(3), Some(RoomClassification::Lobby));
    /// ```
    pub fn set_override(
        &mut self,
        room_id: u32,
        classification: RoomClassification,
    ) -> FloorplanResult<()> {
        if !classification.is_assignable() {
            return Err(FloorplanError::InvalidOverride(format!(
                "room {room_id} cannot be pinned to {classification}"
            )));
        }
        self.overrides.insert(room_id, classification);
        Ok(())
    }

    /// Pins a room using a classification name such as `"ConferenceRoom"`.
    pub fn set_override_by_name(&mut self, room_id: u32, name: &str) -> FloorplanResult<()> {
        let classification = Self::parse_classification(name)?;
        self.set_override(room_id, classification)
    }

    pub fn remove_override(&mut self, room_id: u32) -> Option<RoomClassification> {
        self.overrides.remove(&room_id)
    }

    pub fn clear(&mut self) {
        self.overrides.clear();
    }

    pub fn get(&self, room_id: u32) -> Option<RoomClassification> {
        self.overrides.get(&room_id).copied()
    }

    pub fn contains(&self, room_id: u32) -> bool {
        self.overrides.contains_key(&room_id)
    }

    /// Overrides in ascending room id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, RoomClassification)> + '_ {
        self.overrides.iter().map(|(&id, &classification)| (id, classification))
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Parses an assignable classification name, ignoring case.
    pub fn parse_classification(name: &str) -> FloorplanResult<RoomClassification> {
        let classification: RoomClassification = name.parse()?;
        if classification.is_assignable() {
            Ok(classification)
        } else {
            Err(FloorplanError::InvalidOverride(format!(
                "'{name}' is not an assignable room type"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_remove_overrides() {
        let mut overrides = OverrideManager::new();
        overrides.set_override(2, RoomClassification::Storage).unwrap();
        overrides.set_override(2, RoomClassification::BreakRoom).unwrap();
        overrides.set_override(0, RoomClassification::Lobby).unwrap();

        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides.get(2), Some(RoomClassification::BreakRoom));
        assert_eq!(
            overrides.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            vec![0, 2]
        );

        assert_eq!(overrides.remove_override(2), Some(RoomClassification::BreakRoom));
        assert!(!overrides.contains(2));
        overrides.clear();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_unassigned_is_rejected() {
        let mut overrides = OverrideManager::new();
        assert!(matches!(
            overrides.set_override(1, RoomClassification::Unassigned),
            Err(FloorplanError::InvalidOverride(_))
        ));
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_override_names() {
        let mut overrides = OverrideManager::new();
        overrides.set_override_by_name(5, "openoffice").unwrap();
        assert_eq!(overrides.get(5), Some(RoomClassification::OpenOffice));
        assert!(overrides.set_override_by_name(6, "Unassigned").is_err());
        assert!(overrides.set_override_by_name(6, "Gymnasium").is_err());
    }

    #[test]
    fn test_from_map_validates_every_entry() {
        let mut map = BTreeMap::new();
        map.insert(1, RoomClassification::Office);
        assert_eq!(OverrideManager::from_map(&map).unwrap().len(), 1);

        map.insert(2, RoomClassification::Unassigned);
        assert!(OverrideManager::from_map(&map).is_err());
    }
}
