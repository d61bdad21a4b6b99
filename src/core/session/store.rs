//! Session state machine driver: validates transitions, checkpoints to
//! durable storage, and enumerates recoverable sessions on startup.

use super::types::{
    FolderProgress, FolderStatus, Phase, RecoveryDecision, RecoveryStrategy, Session,
    SessionStatus,
};
use crate::core::persistence::Persistence;
use crate::error::SessionError;
use crate::events::{Event, EventSender, SessionEvent};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Checkpoints are written at least this often while a session is actively
/// scanning, per spec.md §4.7.
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(2);

/// Drives one session's lifecycle: validates `SessionStatus` transitions,
/// snapshots to durable storage on every transition and periodically during
/// scanning, and tracks per-folder progress.
pub struct SessionStore {
    persistence: std::sync::Arc<dyn Persistence>,
    checkpoint_dir: PathBuf,
    session: Mutex<Session>,
    last_checkpoint: Mutex<Instant>,
}

impl SessionStore {
    pub fn new(
        persistence: std::sync::Arc<dyn Persistence>,
        checkpoint_dir: PathBuf,
        session: Session,
    ) -> Self {
        Self {
            persistence,
            checkpoint_dir,
            session: Mutex::new(session),
            last_checkpoint: Mutex::new(Instant::now()),
        }
    }

    /// `<app-support>/Sessions`, the default checkpoint directory per
    /// spec.md §6.
    pub fn default_checkpoint_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("photo-dedupe")
            .join("Sessions")
    }

    pub fn session(&self) -> Session {
        self.session.lock().expect("session lock poisoned").clone()
    }

    pub fn id(&self) -> Uuid {
        self.session().id
    }

    /// Move to a new top-level status, rejecting illegal transitions, then
    /// checkpoint unconditionally.
    pub fn transition(
        &self,
        to: SessionStatus,
        events: &EventSender,
    ) -> Result<(), SessionError> {
        {
            let mut session = self.session.lock().expect("session lock poisoned");
            if !session.status.can_transition_to(to) {
                return Err(SessionError::InvalidTransition {
                    from: session.status.to_string(),
                    to: to.to_string(),
                });
            }
            session.status = to;
            session.updated_at = Utc::now();
            if to == SessionStatus::Scanning && session.metrics.started_at.is_none() {
                session.metrics.started_at = Some(session.updated_at);
            }
            if matches!(
                to,
                SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Failed
            ) {
                session.metrics.completed_at = Some(session.updated_at);
            }
        }

        self.checkpoint_now(events)?;
        let session_id = self.id().to_string();
        events.send(Event::Session(SessionEvent::StatusChanged {
            session_id,
            status: to.to_string(),
        }));
        Ok(())
    }

    /// Record a new sub-phase inside `scanning`, without a full status
    /// transition.
    pub fn set_phase(&self, phase: Phase) {
        let mut session = self.session.lock().expect("session lock poisoned");
        session.phase = Some(phase);
        session.metrics.phase = Some(phase);
        session.updated_at = Utc::now();
    }

    /// Update the status of the folder whose root matches `path`, attributing
    /// the event via the component-wise prefix match in `folder_for_path`
    /// (immune to the raw-string-prefix bug that misattributes e.g.
    /// `/Photos2` events to a `/Photos` root).
    pub fn mark_folder(&self, path: &Path, status: FolderStatus) {
        let mut session = self.session.lock().expect("session lock poisoned");
        let now = Utc::now();
        let target = session
            .folder_for_path(path)
            .map(|f| f.url.clone());
        if let Some(url) = target {
            if let Some(folder) = session.folders.iter_mut().find(|f| f.url == url) {
                folder.status = status;
                folder.last_event_at = now;
            }
        }
        session.updated_at = now;
    }

    pub fn record_processed(&self, is_duplicate: bool, bytes_reclaimable: u64) {
        let mut session = self.session.lock().expect("session lock poisoned");
        session.metrics.items_processed += 1;
        if is_duplicate {
            session.metrics.duplicates_flagged += 1;
            session.metrics.bytes_reclaimable += bytes_reclaimable;
        }
    }

    pub fn record_error(&self) {
        let mut session = self.session.lock().expect("session lock poisoned");
        session.metrics.errors += 1;
    }

    /// Checkpoint if at least `CHECKPOINT_INTERVAL` has elapsed since the
    /// last one. Called from the orchestrator's suspension points during
    /// scanning.
    pub fn maybe_checkpoint(&self, events: &EventSender) -> Result<(), SessionError> {
        let mut last = self.last_checkpoint.lock().expect("checkpoint lock poisoned");
        if last.elapsed() < CHECKPOINT_INTERVAL {
            return Ok(());
        }
        *last = Instant::now();
        drop(last);
        self.checkpoint_now(events)
    }

    /// Unconditionally snapshot the session to the durable store and to a
    /// JSON checkpoint file.
    pub fn checkpoint_now(&self, events: &EventSender) -> Result<(), SessionError> {
        let session = self.session();

        self.persistence
            .save_session(&session)
            .map_err(|e| SessionError::WriteFailed {
                path: self.checkpoint_path(session.id),
                reason: e.to_string(),
            })?;

        let path = write_checkpoint_file(&self.checkpoint_dir, &session)?;
        events.send(Event::Session(SessionEvent::Checkpointed {
            session_id: session.id.to_string(),
            path,
        }));
        Ok(())
    }

    fn checkpoint_path(&self, id: Uuid) -> PathBuf {
        self.checkpoint_dir.join(format!("session-{id}.json"))
    }

    /// List every `session-*.json` file under `checkpoint_dir` whose status
    /// warrants a recovery prompt, grouping sessions that scanned an
    /// overlapping set of root folders into a merge suggestion rather than
    /// a plain resume.
    pub fn enumerate_recoverable(checkpoint_dir: &Path) -> Result<Vec<RecoveryDecision>, SessionError> {
        let mut sessions = Vec::new();
        let entries = match std::fs::read_dir(checkpoint_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SessionError::ReadFailed {
                    path: checkpoint_dir.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        for entry in entries {
            let entry = entry.map_err(|e| SessionError::ReadFailed {
                path: checkpoint_dir.to_path_buf(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let session = read_checkpoint_file(&path)?;
            if session.is_recoverable() {
                sessions.push(session);
            }
        }

        let mut decisions = Vec::with_capacity(sessions.len());
        for (i, session) in sessions.iter().enumerate() {
            let overlaps = sessions.iter().enumerate().any(|(j, other)| {
                i != j
                    && session
                        .folders
                        .iter()
                        .any(|f| other.folders.iter().any(|g| g.url == f.url))
            });

            let strategy = if overlaps {
                RecoveryStrategy::MergeSessions
            } else {
                RecoveryStrategy::Resume
            };
            let reason = format!(
                "session {} ended in {} status with {} file(s) processed",
                session.id, session.status, session.metrics.items_processed
            );

            decisions.push(RecoveryDecision {
                session_id: session.id,
                strategy,
                reason,
            });
        }

        Ok(decisions)
    }

    /// Already-indexed `(path, size, mtime)` triples are recovered from
    /// Persistence rather than the session checkpoint itself; the
    /// checkpoint only tracks per-folder progress and metrics. Resume
    /// re-walks every root but the orchestrator's indexer skips any file
    /// whose record and signatures are already present.
    pub fn folders(&self) -> Vec<FolderProgress> {
        self.session().folders
    }
}

/// Atomically write a session checkpoint (write-to-tmp-then-rename), shared
/// by `SessionStore` and by `SqlitePersistence`'s session methods, which are
/// file operations against this same directory rather than SQL rows (see
/// `persistence::sqlite`).
pub fn write_checkpoint_file(dir: &Path, session: &Session) -> Result<PathBuf, SessionError> {
    std::fs::create_dir_all(dir).map_err(|e| SessionError::WriteFailed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let path = dir.join(format!("session-{}.json", session.id));
    let tmp_path = dir.join(format!("session-{}.json.tmp", session.id));

    let data = serde_json::to_vec_pretty(session).map_err(|e| SessionError::WriteFailed {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    std::fs::write(&tmp_path, data).map_err(|e| SessionError::WriteFailed {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    std::fs::rename(&tmp_path, &path).map_err(|e| SessionError::WriteFailed {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    Ok(path)
}

/// Read and decode a session checkpoint file. Unknown fields are ignored by
/// serde by default; a required field missing is a fatal read error.
pub fn read_checkpoint_file(path: &Path) -> Result<Session, SessionError> {
    let data = std::fs::read_to_string(path).map_err(|e| SessionError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|e| SessionError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persistence::MemoryPersistence;
    use crate::events::EventChannel;
    use tempfile::TempDir;

    fn store_with(dir: &Path) -> SessionStore {
        let session = Session::new(vec![PathBuf::from("/photos")]);
        SessionStore::new(
            std::sync::Arc::new(MemoryPersistence::new()),
            dir.to_path_buf(),
            session,
        )
    }

    #[test]
    fn legal_transition_updates_status_and_checkpoints() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path());
        let (sender, _receiver) = EventChannel::new();

        store.transition(SessionStatus::Scanning, &sender).unwrap();

        assert_eq!(store.session().status, SessionStatus::Scanning);
        assert!(dir.path().join(format!("session-{}.json", store.id())).exists());
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path());
        let (sender, _receiver) = EventChannel::new();

        let result = store.transition(SessionStatus::Completed, &sender);
        assert!(result.is_err());
    }

    #[test]
    fn checkpoint_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path());
        let (sender, _receiver) = EventChannel::new();

        store.transition(SessionStatus::Scanning, &sender).unwrap();
        let path = dir.path().join(format!("session-{}.json", store.id()));
        let loaded = read_checkpoint_file(&path).unwrap();

        assert_eq!(loaded.id, store.id());
        assert_eq!(loaded.status, SessionStatus::Scanning);
    }

    #[test]
    fn enumerate_recoverable_finds_interrupted_sessions() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path());
        let (sender, _receiver) = EventChannel::new();
        store.transition(SessionStatus::Scanning, &sender).unwrap();

        let decisions = SessionStore::enumerate_recoverable(dir.path()).unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].session_id, store.id());
        assert_eq!(decisions[0].strategy, RecoveryStrategy::Resume);
    }

    #[test]
    fn enumerate_recoverable_ignores_completed_sessions() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path());
        let (sender, _receiver) = EventChannel::new();
        store.transition(SessionStatus::Scanning, &sender).unwrap();
        store.transition(SessionStatus::AwaitingReview, &sender).unwrap();
        store.transition(SessionStatus::Completed, &sender).unwrap();

        let decisions = SessionStore::enumerate_recoverable(dir.path()).unwrap();
        assert!(decisions.is_empty());
    }

    #[test]
    fn mark_folder_updates_matching_root_only() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path());
        store.mark_folder(Path::new("/photos/a.jpg"), FolderStatus::Scanning);

        let folders = store.folders();
        assert_eq!(folders[0].status, FolderStatus::Scanning);
    }

    #[test]
    fn mark_folder_does_not_misattribute_sibling_prefix() {
        let dir = TempDir::new().unwrap();
        let store = store_with(dir.path());
        store.mark_folder(Path::new("/photos2/a.jpg"), FolderStatus::Scanning);

        let folders = store.folders();
        assert_eq!(folders[0].status, FolderStatus::Pending);
    }
}
