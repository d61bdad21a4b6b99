//! SQLite-backed persistence.
//!
//! Uses WAL (Write-Ahead Logging) mode so readers never block on the single
//! writer thread, and `synchronous=NORMAL` so a commit fsyncs the WAL
//! without forcing a full checkpoint on every write.

use super::{FileRecord, Persistence};
use crate::core::hasher::{ContentHash, HashAlgorithmKind, PerceptualHash, VideoSignature};
use crate::core::scanner::MediaType;
use crate::core::session::{self, Session};
use crate::error::PersistenceError;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// `rusqlite`-backed store for file records and signatures. Session
/// checkpoints are *not* a table here: they are the same JSON files
/// `SessionStore` writes under `sessions_dir`, read back directly, so the
/// on-disk checkpoint format has exactly one writer and one schema.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    sessions_dir: PathBuf,
}

impl SqlitePersistence {
    pub fn open(path: &Path, sessions_dir: PathBuf) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )
        .map_err(|e| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let backend = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
            sessions_dir,
        };
        backend.init_schema()?;
        Ok(backend)
    }

    pub fn open_in_memory(sessions_dir: PathBuf) -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(|e| PersistenceError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        let backend = Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
            sessions_dir,
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS file_records (
                id TEXT PRIMARY KEY,
                path TEXT UNIQUE NOT NULL,
                media_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                modified_at INTEGER NOT NULL,
                width INTEGER,
                height INTEGER,
                capture_date INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_file_records_path ON file_records(path);
            CREATE INDEX IF NOT EXISTS idx_file_records_media_size ON file_records(media_type, size);
            CREATE INDEX IF NOT EXISTS idx_file_records_capture_date ON file_records(capture_date);

            CREATE TABLE IF NOT EXISTS content_hashes (
                file_id TEXT PRIMARY KEY,
                hash BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_content_hashes_hash ON content_hashes(hash);

            CREATE TABLE IF NOT EXISTS perceptual_hashes (
                file_id TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                hash INTEGER NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                computed_at INTEGER NOT NULL,
                PRIMARY KEY (file_id, algorithm)
            );

            CREATE TABLE IF NOT EXISTS video_signatures (
                file_id TEXT PRIMARY KEY,
                duration_sec REAL NOT NULL,
                frame_hashes TEXT NOT NULL
            );",
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn algorithm_to_str(algorithm: HashAlgorithmKind) -> &'static str {
        match algorithm {
            HashAlgorithmKind::Difference => "difference",
            HashAlgorithmKind::Perceptual => "perceptual",
        }
    }

    fn algorithm_from_str(s: &str) -> Option<HashAlgorithmKind> {
        match s {
            "difference" => Some(HashAlgorithmKind::Difference),
            "perceptual" => Some(HashAlgorithmKind::Perceptual),
            _ => None,
        }
    }

    fn media_type_to_str(media_type: MediaType) -> &'static str {
        match media_type {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
        }
    }

    fn media_type_from_str(s: &str) -> MediaType {
        match s {
            "video" => MediaType::Video,
            _ => MediaType::Photo,
        }
    }

    fn row_to_file_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
        let id: String = row.get(0)?;
        let path: String = row.get(1)?;
        let media_type: String = row.get(2)?;
        let size: i64 = row.get(3)?;
        let created_at: i64 = row.get(4)?;
        let modified_at: i64 = row.get(5)?;
        let width: Option<i64> = row.get(6)?;
        let height: Option<i64> = row.get(7)?;
        let capture_date: Option<i64> = row.get(8)?;

        Ok(FileRecord {
            id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
            path: PathBuf::from(path),
            media_type: Self::media_type_from_str(&media_type),
            size: size as u64,
            created_at: timestamp_to_datetime(created_at),
            modified_at: timestamp_to_datetime(modified_at),
            width: width.map(|v| v as u32),
            height: height.map(|v| v as u32),
            capture_date: capture_date.map(timestamp_to_datetime),
        })
    }
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

const FILE_RECORD_COLUMNS: &str =
    "id, path, media_type, size, created_at, modified_at, width, height, capture_date";

impl Persistence for SqlitePersistence {
    fn upsert_file_record(&self, record: &FileRecord) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO file_records ({FILE_RECORD_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                record.id.to_string(),
                record.path.to_string_lossy(),
                Self::media_type_to_str(record.media_type),
                record.size as i64,
                record.created_at.timestamp(),
                record.modified_at.timestamp(),
                record.width.map(|v| v as i64),
                record.height.map(|v| v as i64),
                record.capture_date.map(|d| d.timestamp()),
            ],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn get_file_record_by_path(&self, path: &Path) -> Result<Option<FileRecord>, PersistenceError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {FILE_RECORD_COLUMNS} FROM file_records WHERE path = ?"),
            [path.to_string_lossy()],
            Self::row_to_file_record,
        )
        .optional()
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))
    }

    fn delete_file_record(&self, id: Uuid) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        let id_str = id.to_string();
        conn.execute("DELETE FROM file_records WHERE id = ?", [&id_str])
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        conn.execute("DELETE FROM content_hashes WHERE file_id = ?", [&id_str])
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        conn.execute("DELETE FROM perceptual_hashes WHERE file_id = ?", [&id_str])
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        conn.execute("DELETE FROM video_signatures WHERE file_id = ?", [&id_str])
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn upsert_content_hash(&self, file_id: Uuid, hash: ContentHash) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO content_hashes (file_id, hash) VALUES (?, ?)",
            params![file_id.to_string(), hash.to_vec()],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn upsert_perceptual_hash(
        &self,
        file_id: Uuid,
        hash: &PerceptualHash,
    ) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO perceptual_hashes
             (file_id, algorithm, hash, width, height, computed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                file_id.to_string(),
                Self::algorithm_to_str(hash.algorithm),
                hash.hash as i64,
                hash.width as i64,
                hash.height as i64,
                hash.computed_at.timestamp(),
            ],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn upsert_video_signature(
        &self,
        file_id: Uuid,
        signature: &VideoSignature,
    ) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        let frame_hashes = serde_json::to_string(&signature.frame_hashes)
            .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO video_signatures (file_id, duration_sec, frame_hashes)
             VALUES (?, ?, ?)",
            params![file_id.to_string(), signature.duration_sec, frame_hashes],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn get_content_hash(&self, file_id: Uuid) -> Result<Option<ContentHash>, PersistenceError> {
        let conn = self.lock()?;
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT hash FROM content_hashes WHERE file_id = ?",
                [file_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        match bytes {
            Some(bytes) => {
                let array: ContentHash = bytes.try_into().map_err(|_| {
                    PersistenceError::SerializationFailed(
                        "stored content hash is not 32 bytes".to_string(),
                    )
                })?;
                Ok(Some(array))
            }
            None => Ok(None),
        }
    }

    fn get_perceptual_hashes(&self, file_id: Uuid) -> Result<Vec<PerceptualHash>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT algorithm, hash, width, height, computed_at
                 FROM perceptual_hashes WHERE file_id = ?",
            )
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([file_id.to_string()], |row| {
                let algorithm: String = row.get(0)?;
                let hash: i64 = row.get(1)?;
                let width: i64 = row.get(2)?;
                let height: i64 = row.get(3)?;
                let computed_at: i64 = row.get(4)?;
                Ok((algorithm, hash, width, height, computed_at))
            })
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        let mut hashes = Vec::new();
        for row in rows {
            let (algorithm, hash, width, height, computed_at) =
                row.map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
            let Some(algorithm) = Self::algorithm_from_str(&algorithm) else {
                continue;
            };
            hashes.push(PerceptualHash {
                algorithm,
                hash: hash as u64,
                width: width as u32,
                height: height as u32,
                computed_at: timestamp_to_datetime(computed_at),
            });
        }
        Ok(hashes)
    }

    fn get_video_signature(&self, file_id: Uuid) -> Result<Option<VideoSignature>, PersistenceError> {
        let conn = self.lock()?;
        let row: Option<(f64, String)> = conn
            .query_row(
                "SELECT duration_sec, frame_hashes FROM video_signatures WHERE file_id = ?",
                [file_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        match row {
            Some((duration_sec, frame_hashes_json)) => {
                let frame_hashes: [u64; 5] = serde_json::from_str(&frame_hashes_json)
                    .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))?;
                Ok(Some(VideoSignature {
                    duration_sec,
                    frame_hashes,
                }))
            }
            None => Ok(None),
        }
    }

    fn query_by_size_range(&self, min: u64, max: u64) -> Result<Vec<FileRecord>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {FILE_RECORD_COLUMNS} FROM file_records WHERE size BETWEEN ? AND ?"
            ))
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map(params![min as i64, max as i64], Self::row_to_file_record)
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))
    }

    fn query_by_dimensions(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Vec<FileRecord>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {FILE_RECORD_COLUMNS} FROM file_records WHERE width = ? AND height = ?"
            ))
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map(params![width as i64, height as i64], Self::row_to_file_record)
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))
    }

    fn query_by_capture_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {FILE_RECORD_COLUMNS} FROM file_records
                 WHERE capture_date BETWEEN ? AND ?"
            ))
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map(
                params![start.timestamp(), end.timestamp()],
                Self::row_to_file_record,
            )
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))
    }

    fn query_videos_by_duration(
        &self,
        min_sec: f64,
        max_sec: f64,
    ) -> Result<Vec<FileRecord>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT f.{} FROM file_records f
                 JOIN video_signatures v ON v.file_id = f.id
                 WHERE v.duration_sec BETWEEN ? AND ?",
                FILE_RECORD_COLUMNS.replace(", ", ", f.")
            ))
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map(params![min_sec, max_sec], Self::row_to_file_record)
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))
    }

    fn save_session(&self, session: &Session) -> Result<(), PersistenceError> {
        session::write_checkpoint_file(&self.sessions_dir, session)
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn load_session(&self, id: Uuid) -> Result<Option<Session>, PersistenceError> {
        let path = self.sessions_dir.join(format!("session-{id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        session::read_checkpoint_file(&path)
            .map(Some)
            .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))
    }

    fn latest_session(&self) -> Result<Option<Session>, PersistenceError> {
        Ok(self
            .all_sessions()?
            .into_iter()
            .max_by_key(|s| s.updated_at))
    }

    fn prune_sessions(&self, keep_latest: usize) -> Result<usize, PersistenceError> {
        let mut sessions = self.all_sessions()?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let stale = sessions.split_off(keep_latest.min(sessions.len()));
        for session in &stale {
            let path = self.sessions_dir.join(format!("session-{}.json", session.id));
            std::fs::remove_file(&path).map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        }
        Ok(stale.len())
    }
}

impl SqlitePersistence {
    fn all_sessions(&self) -> Result<Vec<Session>, PersistenceError> {
        let entries = match std::fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PersistenceError::QueryFailed(e.to_string()));
            }
        };

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            sessions.push(
                session::read_checkpoint_file(&path)
                    .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))?,
            );
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::HashAlgorithmKind;
    use crate::core::session::Session;
    use tempfile::TempDir;

    fn open_test_db() -> (SqlitePersistence, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = SqlitePersistence::open_in_memory(dir.path().join("Sessions")).unwrap();
        (db, dir)
    }

    fn make_record(path: &str) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: FileRecord::id_for_path(Path::new(path)),
            path: PathBuf::from(path),
            media_type: MediaType::Photo,
            size: 1_000,
            created_at: now,
            modified_at: now,
            width: Some(800),
            height: Some(600),
            capture_date: Some(now),
        }
    }

    #[test]
    fn file_record_round_trips() {
        let (db, _dir) = open_test_db();
        let record = make_record("/photos/a.jpg");
        db.upsert_file_record(&record).unwrap();

        let loaded = db
            .get_file_record_by_path(Path::new("/photos/a.jpg"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.size, record.size);
        assert_eq!(loaded.width, record.width);
    }

    #[test]
    fn delete_file_record_removes_signatures_too() {
        let (db, _dir) = open_test_db();
        let record = make_record("/photos/a.jpg");
        db.upsert_file_record(&record).unwrap();
        db.upsert_content_hash(record.id, [9u8; 32]).unwrap();

        db.delete_file_record(record.id).unwrap();

        assert!(db
            .get_file_record_by_path(Path::new("/photos/a.jpg"))
            .unwrap()
            .is_none());
        assert!(db.get_content_hash(record.id).unwrap().is_none());
    }

    #[test]
    fn perceptual_hash_round_trips_byte_identical() {
        let (db, _dir) = open_test_db();
        let record = make_record("/photos/a.jpg");
        db.upsert_file_record(&record).unwrap();

        let hash = PerceptualHash {
            algorithm: HashAlgorithmKind::Difference,
            hash: 0xDEAD_BEEF_0000_1234,
            width: 800,
            height: 600,
            computed_at: Utc::now(),
        };
        db.upsert_perceptual_hash(record.id, &hash).unwrap();

        let loaded = db.get_perceptual_hashes(record.id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].hash, hash.hash);
    }

    #[test]
    fn video_signature_round_trips() {
        let (db, _dir) = open_test_db();
        let record = make_record("/videos/a.mp4");
        db.upsert_file_record(&record).unwrap();

        let signature = VideoSignature {
            duration_sec: 12.5,
            frame_hashes: [1, 2, 3, 4, 5],
        };
        db.upsert_video_signature(record.id, &signature).unwrap();

        let loaded = db.get_video_signature(record.id).unwrap().unwrap();
        assert_eq!(loaded.duration_sec, signature.duration_sec);
        assert_eq!(loaded.frame_hashes, signature.frame_hashes);
    }

    #[test]
    fn query_by_size_range_filters_correctly() {
        let (db, _dir) = open_test_db();
        db.upsert_file_record(&make_record("/a.jpg")).unwrap();
        let mut big = make_record("/b.jpg");
        big.size = 10_000_000;
        db.upsert_file_record(&big).unwrap();

        let found = db.query_by_size_range(0, 5_000).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, PathBuf::from("/a.jpg"));
    }

    #[test]
    fn session_round_trips_and_orders_by_recency() {
        let (db, _dir) = open_test_db();
        let mut older = Session::new(vec![PathBuf::from("/photos")]);
        older.updated_at = Utc.timestamp_opt(1000, 0).unwrap();
        let mut newer = Session::new(vec![PathBuf::from("/photos")]);
        newer.updated_at = Utc.timestamp_opt(2000, 0).unwrap();

        db.save_session(&older).unwrap();
        db.save_session(&newer).unwrap();

        let latest = db.latest_session().unwrap().unwrap();
        assert_eq!(latest.id, newer.id);

        let loaded = db.load_session(older.id).unwrap().unwrap();
        assert_eq!(loaded.id, older.id);
    }

    #[test]
    fn prune_sessions_keeps_only_latest() {
        let (db, _dir) = open_test_db();
        for i in 0..5u32 {
            let mut session = Session::new(vec![PathBuf::from("/photos")]);
            session.updated_at = Utc.timestamp_opt(i as i64, 0).unwrap();
            db.save_session(&session).unwrap();
        }

        let pruned = db.prune_sessions(2).unwrap();
        assert_eq!(pruned, 3);
    }
}
