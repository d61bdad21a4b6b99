//! In-memory persistence backend, for tests and for callers that don't need
//! a durable store (e.g. `--resume`-less one-shot scans). Unlike
//! `SqlitePersistence`, session checkpoints here are just another map entry
//! rather than file operations — there's no on-disk format to diverge from.

use super::{FileRecord, Persistence};
use crate::core::hasher::{ContentHash, HashAlgorithmKind, PerceptualHash, VideoSignature};
use crate::core::session::Session;
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Store {
    files: HashMap<Uuid, FileRecord>,
    paths: HashMap<PathBuf, Uuid>,
    content_hashes: HashMap<Uuid, ContentHash>,
    perceptual_hashes: HashMap<Uuid, HashMap<HashAlgorithmKind, PerceptualHash>>,
    video_signatures: HashMap<Uuid, VideoSignature>,
    sessions: HashMap<Uuid, Session>,
}

pub struct MemoryPersistence {
    store: Mutex<Store>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().expect("memory persistence lock poisoned")
    }
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for MemoryPersistence {
    fn upsert_file_record(&self, record: &FileRecord) -> Result<(), PersistenceError> {
        let mut store = self.lock();
        store.paths.insert(record.path.clone(), record.id);
        store.files.insert(record.id, record.clone());
        Ok(())
    }

    fn get_file_record_by_path(&self, path: &Path) -> Result<Option<FileRecord>, PersistenceError> {
        let store = self.lock();
        Ok(store
            .paths
            .get(path)
            .and_then(|id| store.files.get(id))
            .cloned())
    }

    fn delete_file_record(&self, id: Uuid) -> Result<(), PersistenceError> {
        let mut store = self.lock();
        if let Some(record) = store.files.remove(&id) {
            store.paths.remove(&record.path);
        }
        store.content_hashes.remove(&id);
        store.perceptual_hashes.remove(&id);
        store.video_signatures.remove(&id);
        Ok(())
    }

    fn upsert_content_hash(&self, file_id: Uuid, hash: ContentHash) -> Result<(), PersistenceError> {
        self.lock().content_hashes.insert(file_id, hash);
        Ok(())
    }

    fn upsert_perceptual_hash(
        &self,
        file_id: Uuid,
        hash: &PerceptualHash,
    ) -> Result<(), PersistenceError> {
        self.lock()
            .perceptual_hashes
            .entry(file_id)
            .or_default()
            .insert(hash.algorithm, *hash);
        Ok(())
    }

    fn upsert_video_signature(
        &self,
        file_id: Uuid,
        signature: &VideoSignature,
    ) -> Result<(), PersistenceError> {
        self.lock().video_signatures.insert(file_id, *signature);
        Ok(())
    }

    fn get_content_hash(&self, file_id: Uuid) -> Result<Option<ContentHash>, PersistenceError> {
        Ok(self.lock().content_hashes.get(&file_id).copied())
    }

    fn get_perceptual_hashes(&self, file_id: Uuid) -> Result<Vec<PerceptualHash>, PersistenceError> {
        Ok(self
            .lock()
            .perceptual_hashes
            .get(&file_id)
            .map(|map| map.values().copied().collect())
            .unwrap_or_default())
    }

    fn get_video_signature(&self, file_id: Uuid) -> Result<Option<VideoSignature>, PersistenceError> {
        Ok(self.lock().video_signatures.get(&file_id).copied())
    }

    fn query_by_size_range(&self, min: u64, max: u64) -> Result<Vec<FileRecord>, PersistenceError> {
        Ok(self
            .lock()
            .files
            .values()
            .filter(|f| f.size >= min && f.size <= max)
            .cloned()
            .collect())
    }

    fn query_by_dimensions(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Vec<FileRecord>, PersistenceError> {
        Ok(self
            .lock()
            .files
            .values()
            .filter(|f| f.width == Some(width) && f.height == Some(height))
            .cloned()
            .collect())
    }

    fn query_by_capture_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, PersistenceError> {
        Ok(self
            .lock()
            .files
            .values()
            .filter(|f| matches!(f.capture_date, Some(d) if d >= start && d <= end))
            .cloned()
            .collect())
    }

    fn query_videos_by_duration(
        &self,
        min_sec: f64,
        max_sec: f64,
    ) -> Result<Vec<FileRecord>, PersistenceError> {
        let store = self.lock();
        Ok(store
            .video_signatures
            .iter()
            .filter(|(_, sig)| sig.duration_sec >= min_sec && sig.duration_sec <= max_sec)
            .filter_map(|(id, _)| store.files.get(id).cloned())
            .collect())
    }

    fn save_session(&self, session: &Session) -> Result<(), PersistenceError> {
        self.lock().sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn load_session(&self, id: Uuid) -> Result<Option<Session>, PersistenceError> {
        Ok(self.lock().sessions.get(&id).cloned())
    }

    fn latest_session(&self) -> Result<Option<Session>, PersistenceError> {
        Ok(self
            .lock()
            .sessions
            .values()
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    fn prune_sessions(&self, keep_latest: usize) -> Result<usize, PersistenceError> {
        let mut store = self.lock();
        let mut ids: Vec<(Uuid, DateTime<Utc>)> =
            store.sessions.iter().map(|(&id, s)| (id, s.updated_at)).collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1));

        let stale: Vec<Uuid> = ids.into_iter().skip(keep_latest).map(|(id, _)| id).collect();
        for id in &stale {
            store.sessions.remove(id);
        }
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::MediaType;

    fn make_record(path: &str) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: FileRecord::id_for_path(Path::new(path)),
            path: PathBuf::from(path),
            media_type: MediaType::Photo,
            size: 500,
            created_at: now,
            modified_at: now,
            width: Some(100),
            height: Some(100),
            capture_date: None,
        }
    }

    #[test]
    fn stores_and_retrieves_by_path() {
        let db = MemoryPersistence::new();
        let record = make_record("/a.jpg");
        db.upsert_file_record(&record).unwrap();

        let found = db.get_file_record_by_path(Path::new("/a.jpg")).unwrap();
        assert_eq!(found.unwrap().id, record.id);
    }

    #[test]
    fn delete_removes_record_and_signatures() {
        let db = MemoryPersistence::new();
        let record = make_record("/a.jpg");
        db.upsert_file_record(&record).unwrap();
        db.upsert_content_hash(record.id, [1u8; 32]).unwrap();

        db.delete_file_record(record.id).unwrap();

        assert!(db.get_file_record_by_path(Path::new("/a.jpg")).unwrap().is_none());
        assert!(db.get_content_hash(record.id).unwrap().is_none());
    }

    #[test]
    fn latest_session_picks_most_recently_updated() {
        let db = MemoryPersistence::new();
        let mut older = Session::new(vec![PathBuf::from("/x")]);
        older.updated_at = Utc::now() - chrono::Duration::hours(1);
        let newer = Session::new(vec![PathBuf::from("/x")]);

        db.save_session(&older).unwrap();
        db.save_session(&newer).unwrap();

        assert_eq!(db.latest_session().unwrap().unwrap().id, newer.id);
    }

    #[test]
    fn prune_sessions_keeps_latest_n() {
        let db = MemoryPersistence::new();
        for i in 0..4 {
            let mut session = Session::new(vec![PathBuf::from("/x")]);
            session.updated_at = Utc::now() + chrono::Duration::seconds(i);
            db.save_session(&session).unwrap();
        }

        let pruned = db.prune_sessions(1).unwrap();
        assert_eq!(pruned, 3);
    }
}
