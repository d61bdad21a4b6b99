//! Session state machine types, checkpointed by `SessionStore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Top-level lifecycle state of a scan session.
///
/// ```text
/// idle ──start──▶ scanning ──all-done──▶ awaitingReview ──merge-done──▶ completed
///   │                │                         │
///   │                ├─error──▶ failed         ├─cancel──▶ cancelled
///   │                └─cancel──▶ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Scanning,
    AwaitingReview,
    Completed,
    Cancelled,
    Failed,
}

impl SessionStatus {
    /// Whether `to` is a legal transition from `self`.
    pub fn can_transition_to(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, to),
            (Idle, Scanning)
                | (Scanning, AwaitingReview)
                | (Scanning, Failed)
                | (Scanning, Cancelled)
                | (AwaitingReview, Completed)
                | (AwaitingReview, Cancelled)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Scanning => "scanning",
            SessionStatus::AwaitingReview => "awaitingReview",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Sub-phase within the `scanning` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Preparing,
    Indexing,
    Hashing,
    Grouping,
    Reviewing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Preparing => "preparing",
            Phase::Indexing => "indexing",
            Phase::Hashing => "hashing",
            Phase::Grouping => "grouping",
            Phase::Reviewing => "reviewing",
        };
        write!(f, "{s}")
    }
}

/// Status of one scanned root folder, keyed by its absolute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FolderStatus {
    Pending,
    Scanning,
    Completed,
    Error,
}

/// A root folder tracked by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderProgress {
    pub url: PathBuf,
    pub status: FolderStatus,
    pub last_event_at: DateTime<Utc>,
}

/// Running counters for the current (or last completed) scan.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub phase: Option<Phase>,
    pub items_processed: usize,
    pub duplicates_flagged: usize,
    pub errors: usize,
    pub bytes_reclaimable: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A condensed view of one `DuplicateGroup`, as written into a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSummary {
    pub id: Uuid,
    pub item_count: usize,
    pub representative: PathBuf,
    pub confidence: f64,
}

/// `{id, status, phase, folders[], metrics, duplicateSummaries[], createdAt,
/// updatedAt}`, checkpointed to durable storage per spec.md §4.7/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub status: SessionStatus,
    pub phase: Option<Phase>,
    pub folders: Vec<FolderProgress>,
    pub metrics: Metrics,
    pub duplicate_summaries: Vec<DuplicateSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Idle,
            phase: None,
            folders: roots
                .into_iter()
                .map(|url| FolderProgress {
                    url,
                    status: FolderStatus::Pending,
                    last_event_at: now,
                })
                .collect(),
            metrics: Metrics::default(),
            duplicate_summaries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the session is in a state the recovery flow should surface.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Scanning | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }

    /// The folder entry whose `url` is a prefix of `path`, if any. Used to
    /// attribute a file event emitted mid-scan to the root that produced it.
    pub fn folder_for_path(&self, path: &std::path::Path) -> Option<&FolderProgress> {
        self.folders
            .iter()
            .filter(|f| path.starts_with(&f.url))
            .max_by_key(|f| f.url.as_os_str().len())
    }
}

/// Strategy offered to the user/caller when a recoverable session is found
/// on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryStrategy {
    Resume,
    StartFresh,
    MergeSessions,
}

/// `{session_id, strategy, reason}` surfaced for a recoverable session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryDecision {
    pub session_id: Uuid,
    pub strategy: RecoveryStrategy,
    pub reason: String,
}
