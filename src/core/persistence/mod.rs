//! # Persistence Module
//!
//! Durable storage for file records, content/perceptual/video signatures,
//! and session checkpoints.
//!
//! ## Backends
//! - `SqlitePersistence` - `rusqlite`-backed, WAL mode, batched transactions
//! - `MemoryPersistence` - in-memory, for tests

mod memory;
mod sqlite;

pub use memory::MemoryPersistence;
pub use sqlite::SqlitePersistence;

use crate::core::hasher::{ContentHash, HashAlgorithmKind, PerceptualHash, VideoSignature};
use crate::core::scanner::MediaType;
use crate::core::session::Session;
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A durable record of one observed file. Owned by Persistence; every
/// signature type references it by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub path: PathBuf,
    pub media_type: MediaType,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Capture date read from EXIF when present, used by
    /// `query_by_capture_date_range`.
    pub capture_date: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Deterministic id derived from the absolute path, so the same file
    /// keeps the same id across scans (spec.md's "stable across scans by
    /// absolute path").
    pub fn id_for_path(path: &Path) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes())
    }
}

/// Durable index of file records, their signatures, and session
/// checkpoints. Implementations must support transactional multi-row
/// writes with all-or-nothing visibility across a crash.
pub trait Persistence: Send + Sync {
    fn upsert_file_record(&self, record: &FileRecord) -> Result<(), PersistenceError>;
    fn get_file_record_by_path(&self, path: &Path) -> Result<Option<FileRecord>, PersistenceError>;
    fn delete_file_record(&self, id: Uuid) -> Result<(), PersistenceError>;

    fn upsert_content_hash(&self, file_id: Uuid, hash: ContentHash) -> Result<(), PersistenceError>;
    fn upsert_perceptual_hash(
        &self,
        file_id: Uuid,
        hash: &PerceptualHash,
    ) -> Result<(), PersistenceError>;
    fn upsert_video_signature(
        &self,
        file_id: Uuid,
        signature: &VideoSignature,
    ) -> Result<(), PersistenceError>;

    fn get_content_hash(&self, file_id: Uuid) -> Result<Option<ContentHash>, PersistenceError>;
    fn get_perceptual_hashes(&self, file_id: Uuid) -> Result<Vec<PerceptualHash>, PersistenceError>;
    fn get_video_signature(&self, file_id: Uuid) -> Result<Option<VideoSignature>, PersistenceError>;

    fn query_by_size_range(&self, min: u64, max: u64) -> Result<Vec<FileRecord>, PersistenceError>;
    fn query_by_dimensions(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Vec<FileRecord>, PersistenceError>;
    fn query_by_capture_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, PersistenceError>;
    fn query_videos_by_duration(
        &self,
        min_sec: f64,
        max_sec: f64,
    ) -> Result<Vec<FileRecord>, PersistenceError>;

    fn save_session(&self, session: &Session) -> Result<(), PersistenceError>;
    fn load_session(&self, id: Uuid) -> Result<Option<Session>, PersistenceError>;
    fn latest_session(&self) -> Result<Option<Session>, PersistenceError>;
    /// Delete all but the `keep_latest` most recently updated sessions,
    /// returning the number of rows removed.
    fn prune_sessions(&self, keep_latest: usize) -> Result<usize, PersistenceError>;
}

/// Every algorithm this crate computes a perceptual hash for, used when
/// iterating stored signatures without a fixed-size match arm.
pub const HASH_ALGORITHMS: [HashAlgorithmKind; 2] =
    [HashAlgorithmKind::Difference, HashAlgorithmKind::Perceptual];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_for_path_is_stable() {
        let path = Path::new("/photos/a.jpg");
        assert_eq!(FileRecord::id_for_path(path), FileRecord::id_for_path(path));
    }

    #[test]
    fn id_for_path_differs_across_paths() {
        let a = FileRecord::id_for_path(Path::new("/photos/a.jpg"));
        let b = FileRecord::id_for_path(Path::new("/photos/b.jpg"));
        assert_ne!(a, b);
    }
}
