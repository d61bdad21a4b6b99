//! Trait definitions for perceptual hashing.

use super::fast_decode::FastDecoder;
use crate::error::HashError;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The two perceptual hash algorithms this crate computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithmKind {
    /// Difference Hash (dHash) - adjacent-pixel brightness gradient
    Difference,
    /// Perceptual Hash (pHash) - DCT-based, robust to edits
    Perceptual,
}

impl HashAlgorithmKind {
    pub fn description(&self) -> &'static str {
        match self {
            HashAlgorithmKind::Difference => {
                "Difference Hash (dHash) - compares brightness gradients between pixels"
            }
            HashAlgorithmKind::Perceptual => {
                "Perceptual Hash (pHash) - DCT-based, robust to edits and transformations"
            }
        }
    }
}

impl std::fmt::Display for HashAlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithmKind::Difference => write!(f, "dHash"),
            HashAlgorithmKind::Perceptual => write!(f, "pHash"),
        }
    }
}

/// A single perceptual signature for a FileRecord under one algorithm.
///
/// A FileRecord may hold at most one `PerceptualHash` per algorithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerceptualHash {
    pub algorithm: HashAlgorithmKind,
    pub hash: u64,
    pub width: u32,
    pub height: u32,
    pub computed_at: DateTime<Utc>,
}

impl PerceptualHash {
    /// Hamming distance to another hash: the population count of the XOR.
    /// This is a metric (non-negativity, symmetry, triangle inequality).
    /// Comparing hashes across different algorithms is meaningless and left
    /// to the caller to avoid.
    pub fn distance(&self, other: &Self) -> u32 {
        (self.hash ^ other.hash).count_ones()
    }
}

/// Trait for hash algorithm implementations.
pub trait HashAlgorithm: Send + Sync {
    /// Compute a 64-bit hash from an already-loaded image.
    fn hash_image(&self, image: &DynamicImage) -> Result<u64, HashError>;

    /// Compute a hash directly from a file path, decoding with the
    /// fastest available decoder for the format.
    fn hash_file(&self, path: &Path) -> Result<u64, HashError> {
        let image = FastDecoder::decode(path)?;
        self.hash_image(&image)
    }

    /// Get the algorithm kind.
    fn kind(&self) -> HashAlgorithmKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_at(value: u64, algorithm: HashAlgorithmKind) -> PerceptualHash {
        PerceptualHash {
            algorithm,
            hash: value,
            width: 100,
            height: 100,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        let hash = hash_at(0xDEAD_BEEF_0000_1234, HashAlgorithmKind::Difference);
        assert_eq!(hash.distance(&hash), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = hash_at(0xFFFF_0000_0000_0000, HashAlgorithmKind::Difference);
        let b = hash_at(0x0000_FFFF_0000_0000, HashAlgorithmKind::Difference);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn distance_counts_differing_bits() {
        let a = hash_at(0b11111111, HashAlgorithmKind::Difference);
        let b = hash_at(0b00000000, HashAlgorithmKind::Difference);
        assert_eq!(a.distance(&b), 8);
    }

    #[test]
    fn distance_satisfies_triangle_inequality() {
        let a = hash_at(0x0F0F_0F0F_0F0F_0F0F, HashAlgorithmKind::Perceptual);
        let b = hash_at(0xF0F0_F0F0_F0F0_F0F0, HashAlgorithmKind::Perceptual);
        let c = hash_at(0x00FF_00FF_00FF_00FF, HashAlgorithmKind::Perceptual);
        assert!(a.distance(&c) <= a.distance(&b) + b.distance(&c));
    }

    #[test]
    fn algorithm_kind_display() {
        assert_eq!(HashAlgorithmKind::Difference.to_string(), "dHash");
        assert_eq!(HashAlgorithmKind::Perceptual.to_string(), "pHash");
    }
}
