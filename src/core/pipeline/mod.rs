//! # Pipeline Module
//!
//! Drives the scan-and-group workflow as a bounded, cancellable,
//! checkpoint-emitting concurrent pipeline.
//!
//! ## Stages
//! 1. **Walker** - enumerates media files under the configured roots
//! 2. **Hasher pool** - computes (or recalls) content + perceptual
//!    signatures, bounded concurrency
//! 3. **Indexer** - single writer into the [`SimilarityIndex`], the only
//!    shared mutable state inside a scan
//! 4. **Grouper** - fuses exact and near-duplicate evidence once hashing
//!    completes
//!
//! [`SimilarityIndex`]: crate::core::index::SimilarityIndex

mod config;
mod orchestrator;

pub use config::OrchestratorConfig;
pub use orchestrator::{CancellationToken, OrchestratorResult, ScanOrchestrator};
