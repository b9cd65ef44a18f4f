//! Interest classification of detection labels.
//!
//! Every label starts out as a point of interest. Callers promote labels to
//! concerning or demote them to non-interesting, either one by one or through
//! the presets below.

use super::concern::Concern;
use super::error::CoreError;
use super::image::ScannedImage;
use super::labels;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestLevel {
    Concerning,
    PointOfInterest,
    NonInteresting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestPolicy {
    levels: BTreeMap<&'static str, InterestLevel>,
}

impl Default for InterestPolicy {
    fn default() -> Self {
        Self {
            levels: labels::all_labels()
                .map(|label| (label, InterestLevel::PointOfInterest))
                .collect(),
        }
    }
}

impl InterestPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every preset applied on top of the default policy.
    pub fn recommended() -> Self {
        let mut policy = Self::default();
        policy.make_exposed_genitalia_concerning();
        policy.make_armpits_non_interesting();
        policy.make_belly_non_interesting();
        policy.make_covered_non_interesting();
        policy
    }

    /// Restores a policy from the persisted label lists. Unknown labels fail.
    pub fn from_lists(concerning: &[String], non_interesting: &[String]) -> Result<Self, CoreError> {
        let mut policy = Self::default();
        for label in concerning {
            policy.mark(label, InterestLevel::Concerning)?;
        }
        for label in non_interesting {
            policy.mark(label, InterestLevel::NonInteresting)?;
        }
        Ok(policy)
    }

    pub fn mark(&mut self, label: &str, level: InterestLevel) -> Result<(), CoreError> {
        let label =
            labels::canonical_label(label).ok_or_else(|| CoreError::InvalidLabel(label.to_string()))?;
        self.levels.insert(label, level);
        Ok(())
    }

    /// The level of `label`, or `None` for labels outside of the table.
    pub fn level_of(&self, label: &str) -> Option<InterestLevel> {
        labels::canonical_label(label).and_then(|label| self.levels.get(label).copied())
    }

    /// Labels at `level`, in alphabetical order.
    pub fn labels_at(&self, level: InterestLevel) -> Vec<&'static str> {
        self.levels
            .iter()
            .filter(|(_, l)| **l == level)
            .map(|(label, _)| *label)
            .collect()
    }

    pub fn concerns_at_level<'a>(&self, image: &'a ScannedImage, level: InterestLevel) -> Vec<&'a Concern> {
        image
            .concerns()
            .iter()
            .filter(|concern| self.level_of(concern.name()) == Some(level))
            .collect()
    }

    /// Whether `image` has at least one concerning detection.
    pub fn is_concerning(&self, image: &ScannedImage) -> bool {
        !self.concerns_at_level(image, InterestLevel::Concerning).is_empty()
    }

    pub fn make_exposed_genitalia_concerning(&mut self) {
        self.promote_points_of_interest("GENITALIA_EXPOSED", InterestLevel::Concerning);
    }

    pub fn make_armpits_non_interesting(&mut self) {
        self.promote_points_of_interest("ARMPITS", InterestLevel::NonInteresting);
    }

    pub fn make_belly_non_interesting(&mut self) {
        self.promote_points_of_interest("BELLY", InterestLevel::NonInteresting);
    }

    pub fn make_covered_non_interesting(&mut self) {
        self.promote_points_of_interest("COVERED", InterestLevel::NonInteresting);
    }

    // Presets only touch labels that are still points of interest.
    fn promote_points_of_interest(&mut self, fragment: &str, level: InterestLevel) {
        for (label, current) in self.levels.iter_mut() {
            if *current == InterestLevel::PointOfInterest && label.contains(fragment) {
                tracing::debug!("Marking {} as {:?}", label, level);
                *current = level;
            }
        }
    }
}
