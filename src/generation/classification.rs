//! # Room Classification
//!
//! Assigns a [`RoomClassification`] to every room in three passes:
//!
//! 1. Designer overrides are applied verbatim.
//! 2. Remaining rooms, largest first, are scored against every rule they
//!    qualify for and one of the best candidates is picked with a seeded
//!    weighted draw.
//! 3. Required classifications nobody holds are repaired onto the largest
//!    eligible room.
//!
//! A rule qualifies for a room when the room fits its size bounds and the
//! rule's share, measured against the rooms classified so far plus the one
//! being decided, is still below its target. Because the denominator grows
//! as rooms are processed, results depend on the largest-first order.

use super::overrides::OverrideManager;
use super::{ClassificationSettings, Room, RoomClassification, ValidationReport};
use crate::geometry::Region;
use crate::utils::clamp01;
use crate::{config, FloorplanError, FloorplanResult};
use log::{debug, warn};
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where on the map a room type prefers to sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionPreference {
    Center,
    Edge,
    Corner,
    Any,
}

impl PositionPreference {
    /// Score in `[0, 1]` for a room at normalized center distance `distance`.
    pub fn score(self, distance: f64) -> f64 {
        let d = clamp01(distance);
        match self {
            PositionPreference::Center => 1.0 - d,
            PositionPreference::Edge => d,
            PositionPreference::Corner => d * d,
            PositionPreference::Any => 0.5,
        }
    }
}

/// Which partition depth a room type prefers; used to break score ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthPreference {
    Any,
    /// Rooms from the upper half of the tree (larger leaves)
    Shallow,
    /// Rooms from the lower half of the tree
    Deep,
}

impl DepthPreference {
    pub fn matches(self, depth: u32, max_depth: u32) -> bool {
        let shallow = depth * 2 <= max_depth;
        match self {
            DepthPreference::Any => true,
            DepthPreference::Shallow => shallow,
            DepthPreference::Deep => !shallow,
        }
    }
}

/// Constraints and preferences for one classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTypeRule {
    /// Smallest (width, height) the room type accepts
    pub min_size: (u32, u32),
    /// Largest (width, height) the room type accepts
    pub max_size: (u32, u32),
    pub preferred_size: (u32, u32),
    pub position: PositionPreference,
    pub depth: DepthPreference,
    /// Weight of the rule in scoring, 0.0 to 1.0
    pub priority: f64,
    /// Desired share of all rooms, in percent
    pub target_percentage: f64,
    /// At least one room must hold this classification
    pub required: bool,
    /// Longest side over shortest side the room type tolerates
    pub max_aspect_ratio: Option<f64>,
}

impl RoomTypeRule {
    /// Creates a rule with neutral preferences.
    pub fn new(min_size: (u32, u32), max_size: (u32, u32), preferred_size: (u32, u32)) -> Self {
        Self {
            min_size,
            max_size,
            preferred_size,
            position: PositionPreference::Any,
            depth: DepthPreference::Any,
            priority: 0.5,
            target_percentage: 10.0,
            required: false,
            max_aspect_ratio: None,
        }
    }

    pub fn with_position(mut self, position: PositionPreference) -> Self {
        self.position = position;
        self
    }

    pub fn with_depth(mut self, depth: DepthPreference) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_target(mut self, target_percentage: f64) -> Self {
        self.target_percentage = target_percentage;
        self
    }

    pub fn with_max_aspect_ratio(mut self, ratio: f64) -> Self {
        self.max_aspect_ratio = Some(ratio);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Target share as a fraction of all rooms.
    pub fn target_fraction(&self) -> f64 {
        self.target_percentage / 100.0
    }

    /// Whether a room of these bounds satisfies the size and shape limits.
    pub fn fits(&self, bounds: &Region) -> bool {
        let (w, h) = (bounds.width, bounds.height);
        let sized = (self.min_size.0..=self.max_size.0).contains(&w)
            && (self.min_size.1..=self.max_size.1).contains(&h);
        sized
            && self
                .max_aspect_ratio
                .map_or(true, |limit| bounds.aspect_ratio() <= limit)
    }

    /// How close the room is to the preferred size, in `[0, 1]`.
    pub fn size_score(&self, bounds: &Region) -> f64 {
        let axis = |actual: u32, preferred: u32, min: u32, max: u32| {
            let range = max.saturating_sub(min).max(1) as f64;
            clamp01(1.0 - (actual as f64 - preferred as f64).abs() / range)
        };
        let w = axis(bounds.width, self.preferred_size.0, self.min_size.0, self.max_size.0);
        let h = axis(bounds.height, self.preferred_size.1, self.min_size.1, self.max_size.1);
        (w + h) / 2.0
    }

    /// 1.0 while `share` is under target, falling to 0.0 at twice the target.
    pub fn distribution_score(&self, share: f64) -> f64 {
        let target = self.target_fraction();
        if share < target {
            1.0
        } else if target <= 0.0 {
            0.0
        } else {
            clamp01(1.0 - (share - target) / target)
        }
    }

    /// Checks the rule's bounds and weights.
    pub fn validate(&self, classification: RoomClassification) -> FloorplanResult<()> {
        let invalid = |message: String| {
            Err(FloorplanError::InvalidSettings(format!(
                "{classification} rule: {message}"
            )))
        };
        if self.max_size.0 < self.min_size.0 || self.max_size.1 < self.min_size.1 {
            return invalid(format!(
                "max size {:?} is smaller than min size {:?}",
                self.max_size, self.min_size
            ));
        }
        if !(0.0..=1.0).contains(&self.priority) {
            return invalid(format!("priority {} must be in [0, 1]", self.priority));
        }
        if !(0.0..=100.0).contains(&self.target_percentage) {
            return invalid(format!(
                "target percentage {} must be in [0, 100]",
                self.target_percentage
            ));
        }
        if let Some(ratio) = self.max_aspect_ratio {
            if !(ratio >= 1.0) {
                return invalid(format!("max aspect ratio {ratio} must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Rule table keyed by classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationRules {
    rules: BTreeMap<RoomClassification, RoomTypeRule>,
}

impl ClassificationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule table for a typical office floor.
    ///
    /// Every rule accepts any room size and the targets sum to 100%, so each
    /// room always has a candidate and the shares track their targets on any
    /// partition. Room types differ through priority, position, depth and
    /// preferred size; hard size limits are left to custom tables.
    pub fn office_defaults() -> Self {
        use PositionPreference::*;
        use RoomClassification::*;

        const ANY_MIN: (u32, u32) = (config::MIN_ROOM_SIZE, config::MIN_ROOM_SIZE);
        const ANY_MAX: (u32, u32) = (config::MAX_MAP_DIMENSION, config::MAX_MAP_DIMENSION);

        let mut rules = Self::new();
        rules.insert(
            Lobby,
            RoomTypeRule::new(ANY_MIN, ANY_MAX, (16, 16))
                .with_position(Center)
                .with_depth(DepthPreference::Shallow)
                .with_priority(0.9)
                .with_target(5.0)
                .required(),
        );
        rules.insert(
            ExecutiveOffice,
            RoomTypeRule::new(ANY_MIN, ANY_MAX, (12, 10))
                .with_position(Corner)
                .with_priority(0.8)
                .with_target(5.0)
                .required(),
        );
        rules.insert(
            Office,
            RoomTypeRule::new(ANY_MIN, ANY_MAX, (6, 6))
                .with_position(Edge)
                .with_depth(DepthPreference::Deep)
                .with_priority(0.5)
                .with_target(35.0),
        );
        rules.insert(
            OpenOffice,
            RoomTypeRule::new(ANY_MIN, ANY_MAX, (18, 14))
                .with_depth(DepthPreference::Shallow)
                .with_priority(0.6)
                .with_target(20.0),
        );
        rules.insert(
            ConferenceRoom,
            RoomTypeRule::new(ANY_MIN, ANY_MAX, (8, 6))
                .with_position(Center)
                .with_priority(0.7)
                .with_target(15.0),
        );
        rules.insert(
            BreakRoom,
            RoomTypeRule::new(ANY_MIN, ANY_MAX, (7, 7))
                .with_priority(0.4)
                .with_target(10.0),
        );
        rules.insert(
            Storage,
            RoomTypeRule::new(ANY_MIN, ANY_MAX, (4, 4))
                .with_position(Corner)
                .with_depth(DepthPreference::Deep)
                .with_priority(0.2)
                .with_target(10.0),
        );
        rules
    }

    pub fn insert(
        &mut self,
        classification: RoomClassification,
        rule: RoomTypeRule,
    ) -> Option<RoomTypeRule> {
        self.rules.insert(classification, rule)
    }

    pub fn remove(&mut self, classification: RoomClassification) -> Option<RoomTypeRule> {
        self.rules.remove(&classification)
    }

    pub fn get(&self, classification: RoomClassification) -> Option<&RoomTypeRule> {
        self.rules.get(&classification)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoomClassification, &RoomTypeRule)> + '_ {
        self.rules.iter().map(|(&classification, rule)| (classification, rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classifications flagged as required, in classification order.
    pub fn required(&self) -> Vec<RoomClassification> {
        self.iter()
            .filter(|(_, rule)| rule.required)
            .map(|(classification, _)| classification)
            .collect()
    }

    pub fn validate(&self) -> FloorplanResult<()> {
        for (classification, rule) in self.iter() {
            if !classification.is_assignable() {
                return Err(FloorplanError::InvalidSettings(
                    "rules cannot target Unassigned".to_string(),
                ));
            }
            rule.validate(classification)?;
        }
        Ok(())
    }
}

/// A room moved onto a required classification by the repair pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRepair {
    pub room_id: u32,
    pub from: RoomClassification,
    pub to: RoomClassification,
}

/// Outcome of one classification run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub counts: BTreeMap<RoomClassification, usize>,
    pub overridden: usize,
    /// Rooms that matched no rule and received the default classification
    pub defaulted: usize,
    pub repaired: Vec<ClassificationRepair>,
    /// Required classifications no eligible room could take
    pub unresolved: Vec<RoomClassification>,
    /// Override targets that name rooms not present in the input
    pub unknown_overrides: Vec<u32>,
}

impl ClassificationReport {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, classification: RoomClassification) -> usize {
        self.counts.get(&classification).copied().unwrap_or(0)
    }

    /// Fraction of all classified rooms holding each classification.
    pub fn shares(&self) -> BTreeMap<RoomClassification, f64> {
        let total = self.total().max(1) as f64;
        self.counts
            .iter()
            .map(|(&classification, &count)| (classification, count as f64 / total))
            .collect()
    }
}

/// Scoring weights.
const PRIORITY_WEIGHT: f64 = 100.0;
const SIZE_WEIGHT: f64 = 50.0;
const POSITION_WEIGHT: f64 = 30.0;
const DISTRIBUTION_WEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    classification: RoomClassification,
    score: f64,
    depth_match: bool,
}

/// Rule-based room classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomClassifier {
    pub default_classification: RoomClassification,
    /// Probability of a weighted pick among the top candidates instead of
    /// taking the best scorer
    pub randomness_factor: f64,
}

impl Default for RoomClassifier {
    fn default() -> Self {
        Self {
            default_classification: RoomClassification::Office,
            randomness_factor: 1.0,
        }
    }
}

impl RoomClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &ClassificationSettings) -> Self {
        Self {
            default_classification: settings.default_classification,
            randomness_factor: settings.randomness_factor,
        }
    }

    /// Classifies every room in place.
    ///
    /// Fails only when the rule table is empty or invalid. The same rooms,
    /// rules, overrides and generator state always give the same result.
    pub fn classify(
        &self,
        rooms: &mut [Room],
        bounds: &Region,
        rules: &ClassificationRules,
        overrides: &OverrideManager,
        rng: &mut StdRng,
    ) -> FloorplanResult<ClassificationReport> {
        if rules.is_empty() {
            return Err(FloorplanError::MissingConfiguration(
                "room classification needs at least one rule".to_string(),
            ));
        }
        rules.validate()?;
        if !self.default_classification.is_assignable() {
            return Err(FloorplanError::InvalidSettings(
                "default classification cannot be Unassigned".to_string(),
            ));
        }

        let mut report = ClassificationReport::default();
        let mut pinned = vec![false; rooms.len()];

        // Pass 1: overrides
        for (index, room) in rooms.iter_mut().enumerate() {
            room.classification = RoomClassification::Unassigned;
            if let Some(classification) = overrides.get(room.id) {
                room.classification = classification;
                pinned[index] = true;
                *report.counts.entry(classification).or_insert(0) += 1;
                report.overridden += 1;
            }
        }
        for (room_id, _) in overrides.iter() {
            if !rooms.iter().any(|room| room.id == room_id) {
                warn!("Override for room {} matches no room", room_id);
                report.unknown_overrides.push(room_id);
            }
        }

        // Pass 2: scoring, largest rooms first
        let mut order: Vec<usize> = (0..rooms.len()).filter(|&i| !pinned[i]).collect();
        order.sort_by(|&a, &b| {
            rooms[b]
                .area()
                .cmp(&rooms[a].area())
                .then(rooms[a].id.cmp(&rooms[b].id))
        });

        let max_depth = rooms.iter().map(|room| room.depth).max().unwrap_or(0);
        let mut classified = report.overridden;
        for index in order {
            let room = &rooms[index];
            let distance = normalized_center_distance(&room.bounds, bounds);
            let candidates = self.candidates(room, distance, max_depth, rules, &report.counts, classified);

            let classification = match self.pick(&candidates, rng) {
                Some(classification) => classification,
                None => {
                    report.defaulted += 1;
                    self.default_classification
                }
            };
            rooms[index].classification = classification;
            *report.counts.entry(classification).or_insert(0) += 1;
            classified += 1;
        }

        // Pass 3: required classifications
        for required in rules.required() {
            if report.count(required) > 0 {
                continue;
            }
            self.repair(rooms, &pinned, required, rules, &mut report);
        }

        report.counts.retain(|_, count| *count > 0);
        debug!(
            "Classified {} rooms ({} overridden, {} defaulted, {} repaired)",
            rooms.len(),
            report.overridden,
            report.defaulted,
            report.repaired.len()
        );
        Ok(report)
    }

    fn candidates(
        &self,
        room: &Room,
        distance: f64,
        max_depth: u32,
        rules: &ClassificationRules,
        counts: &BTreeMap<RoomClassification, usize>,
        classified: usize,
    ) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = rules
            .iter()
            .filter_map(|(classification, rule)| {
                let count = counts.get(&classification).copied().unwrap_or(0) as f64;
                let achievable = count / (classified + 1) as f64;
                if !rule.fits(&room.bounds) || achievable >= rule.target_fraction() {
                    return None;
                }

                let share = if classified == 0 {
                    0.0
                } else {
                    count / classified as f64
                };
                let score = rule.priority * PRIORITY_WEIGHT
                    + rule.size_score(&room.bounds) * SIZE_WEIGHT
                    + rule.position.score(distance) * POSITION_WEIGHT
                    + rule.distribution_score(share) * DISTRIBUTION_WEIGHT;
                Some(Candidate {
                    classification,
                    score,
                    depth_match: rule.depth.matches(room.depth, max_depth),
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.depth_match.cmp(&a.depth_match))
                .then(a.classification.cmp(&b.classification))
        });
        candidates.truncate(config::CLASSIFICATION_TOP_CANDIDATES);
        candidates
    }

    fn pick(&self, candidates: &[Candidate], rng: &mut StdRng) -> Option<RoomClassification> {
        let best = candidates.first()?;
        if candidates.len() == 1 || !rng.gen_bool(clamp01(self.randomness_factor)) {
            return Some(best.classification);
        }

        match WeightedIndex::new(candidates.iter().map(|c| c.score.max(0.0))) {
            Ok(weights) => Some(candidates[rng.sample(&weights)].classification),
            Err(_) => Some(best.classification),
        }
    }

    fn repair(
        &self,
        rooms: &mut [Room],
        pinned: &[bool],
        required: RoomClassification,
        rules: &ClassificationRules,
        report: &mut ClassificationReport,
    ) {
        let Some(rule) = rules.get(required) else {
            return;
        };

        let sole_required_holder = |room: &Room| {
            rules.get(room.classification).is_some_and(|r| r.required)
                && report.count(room.classification) == 1
        };
        let chosen = rooms
            .iter()
            .enumerate()
            .filter(|(index, room)| {
                !pinned[*index] && rule.fits(&room.bounds) && !sole_required_holder(room)
            })
            .max_by(|(_, a), (_, b)| a.area().cmp(&b.area()).then(b.id.cmp(&a.id)))
            .map(|(index, _)| index);

        let Some(index) = chosen else {
            warn!("No eligible room for required classification {}", required);
            report.unresolved.push(required);
            return;
        };

        let room = &mut rooms[index];
        let from = room.classification;
        if let Some(count) = report.counts.get_mut(&from) {
            *count = count.saturating_sub(1);
        }
        *report.counts.entry(required).or_insert(0) += 1;
        room.classification = required;
        report.repaired.push(ClassificationRepair {
            room_id: room.id,
            from,
            to: required,
        });
        debug!("Room {} reassigned from {} to required {}", room.id, from, required);
    }
}

/// Distance of a room's center from the map center: 0 at the center, 1 at
/// the farthest corner.
pub fn normalized_center_distance(room: &Region, bounds: &Region) -> f64 {
    let (rx, ry) = room.center_f64();
    let (cx, cy) = bounds.center_f64();
    let half_diagonal = ((bounds.width as f64 / 2.0).powi(2) + (bounds.height as f64 / 2.0).powi(2)).sqrt();
    if half_diagonal <= 0.0 {
        return 0.0;
    }
    clamp01(((rx - cx).powi(2) + (ry - cy).powi(2)).sqrt() / half_diagonal)
}

/// Compares the classification mix of `rooms` with the rule targets.
///
/// A classification whose share differs from its target by more than
/// `tolerance` (relative, so 0.25 means ±25%) yields a warning; every
/// unassigned room yields an error.
pub fn validate_distribution(
    rooms: &[Room],
    rules: &ClassificationRules,
    tolerance: f64,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    if rooms.is_empty() {
        return report;
    }

    let mut counts: BTreeMap<RoomClassification, usize> = BTreeMap::new();
    for room in rooms {
        if room.is_classified() {
            *counts.entry(room.classification).or_insert(0) += 1;
        } else {
            report.error(format!("room {} is unassigned", room.id));
        }
    }

    for (classification, rule) in rules.iter() {
        let target = rule.target_fraction();
        if target <= 0.0 {
            continue;
        }
        let share = counts.get(&classification).copied().unwrap_or(0) as f64 / rooms.len() as f64;
        let deviation = (share - target).abs() / target;
        if deviation > tolerance {
            report.warning(format!(
                "{classification} holds {:.1}% of rooms against a {:.1}% target",
                share * 100.0,
                rule.target_percentage
            ));
        }
    }

    report
}
