//! # Index Module
//!
//! In-memory similarity index over perceptual hashes: a BK-tree per
//! algorithm for radius search at scale, falling back to a linear scan for
//! small collections, plus an exact-match map for byte-identical files.

mod bktree;
mod hamming;
mod similarity;

pub use bktree::BkTree;
pub use hamming::{Distance, Hamming};
pub use similarity::{IndexStats, Match, SimilarityIndex, DEFAULT_NEAR_RADIUS};
