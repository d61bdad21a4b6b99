//! # Comparator Module
//!
//! Fuses exact and near-duplicate evidence into confidence-scored groups.
//!
//! ## How It Works
//! 1. **Exact pass** — every content-hash bucket of size ≥2 is a group at
//!    confidence 1.0.
//! 2. **Near pass** — files not already exactly grouped are compared via
//!    the [`SimilarityIndex`](crate::core::index::SimilarityIndex): an edge
//!    is drawn between two files when either perceptual hash matches within
//!    `near_radius` and their byte sizes are within a 4:1 ratio of each
//!    other. Connected components of that graph become groups, with
//!    confidence equal to the weakest edge in the component.
//! 3. Groups below `confidence_floor` are dropped.

mod grouper;

pub use grouper::Grouper;

use crate::core::hasher::{ContentHash, PerceptualHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Minimum confidence a group must clear to be reported, absent an
/// explicit override.
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.85;

/// Byte-size ratio (smaller/larger) two files must fall within to be
/// considered for a near-duplicate edge.
pub const SIZE_RATIO_GATE: std::ops::RangeInclusive<f64> = 0.25..=4.0;

/// Tunables for [`Grouper::group`].
#[derive(Debug, Clone)]
pub struct GrouperConfig {
    /// Skip the near pass entirely; report only byte-identical groups.
    pub exact_only: bool,
    /// Hamming radius for the near pass (see `SimilarityIndex::query_near`).
    pub near_radius: u32,
    /// Groups scoring below this confidence are dropped.
    pub confidence_floor: f64,
}

impl Default for GrouperConfig {
    fn default() -> Self {
        Self {
            exact_only: false,
            near_radius: crate::core::index::DEFAULT_NEAR_RADIUS,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

/// Everything the Grouper needs about one observed file: identity, the
/// fields that drive the size-ratio gate and representative tie-break, and
/// whichever signatures were computed for it.
#[derive(Debug, Clone)]
pub struct FileSignature {
    pub id: Uuid,
    pub path: PathBuf,
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub content_hash: Option<ContentHash>,
    pub perceptual_hashes: Vec<PerceptualHash>,
}

/// A cluster of files judged to be duplicates of one another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: Uuid,
    pub members: Vec<Uuid>,
    pub representative: Uuid,
    pub confidence: f64,
}

impl DuplicateGroup {
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }
}

/// A single pairwise match discovered during the near pass, kept around for
/// UI/debugging purposes (e.g. explaining why two files were grouped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub file_a: Uuid,
    pub file_b: Uuid,
    pub distance: u32,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_group_counts_exclude_representative() {
        let group = DuplicateGroup {
            id: Uuid::new_v4(),
            members: vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()],
            representative: Uuid::new_v4(),
            confidence: 1.0,
        };
        assert_eq!(group.duplicate_count(), 2);
    }

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = GrouperConfig::default();
        assert!(!config.exact_only);
        assert_eq!(config.confidence_floor, 0.85);
    }
}
