//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the scan-and-group pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Walker phase events
    Scan(ScanEvent),
    /// Hasher phase events
    Hash(HashEvent),
    /// Grouper phase events
    Compare(CompareEvent),
    /// Orchestrator-level events
    Pipeline(PipelineEvent),
    /// Session state machine events
    Session(SessionEvent),
}

/// Events emitted by the Walker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Walking has started
    Started { paths: Vec<PathBuf> },
    /// Progress update during walking
    Progress(ScanProgress),
    /// A media file was found
    FileFound { path: PathBuf },
    /// A path was skipped due to a non-fatal I/O error
    Skipped { path: PathBuf, reason: String },
    /// An error occurred but walking continues
    Error { path: PathBuf, message: String },
    /// Walking completed
    Completed { total_files: usize },
}

/// Progress information during walking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories scanned so far
    pub directories_scanned: usize,
    /// Number of files found so far
    pub photos_found: usize,
    /// Current directory being scanned
    pub current_path: PathBuf,
}

/// Events emitted by the hasher pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    /// Hashing has started
    Started { total_photos: usize },
    /// Progress update during hashing
    Progress(HashProgress),
    /// A file was successfully hashed
    PhotoHashed { path: PathBuf },
    /// A file's signatures were loaded from the durable store (no rehash needed)
    CacheHit { path: PathBuf },
    /// An error occurred but hashing continues
    Error { path: PathBuf, message: String },
    /// Hashing completed
    Completed {
        total_hashed: usize,
        cache_hits: usize,
    },
}

/// Progress information during hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    /// Number of files hashed so far
    pub completed: usize,
    /// Total number of files to hash
    pub total: usize,
    /// Current file being hashed
    pub current_path: PathBuf,
    /// Number of cache hits
    pub cache_hits: usize,
}

/// Events emitted by the Grouper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompareEvent {
    /// Comparison has started
    Started { total_photos: usize },
    /// Progress update during comparison
    Progress(CompareProgress),
    /// A duplicate group was found
    DuplicateFound {
        group_id: String,
        photo_count: usize,
    },
    /// Comparison completed
    Completed {
        total_groups: usize,
        total_duplicates: usize,
    },
}

/// Progress information during comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareProgress {
    /// Number of comparisons completed
    pub comparisons_completed: usize,
    /// Total number of comparisons needed
    pub total_comparisons: usize,
    /// Number of duplicate groups found so far
    pub groups_found: usize,
}

/// Orchestrator-level events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Orchestrator has started a scan
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// A periodic checkpoint tick fired
    Checkpoint,
    /// Orchestrator completed successfully
    Completed { summary: PipelineSummary },
    /// Orchestrator was cancelled
    Cancelled,
    /// Orchestrator encountered a fatal error
    Error { message: String },
}

/// Phases of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Preparing,
    Indexing,
    Hashing,
    Grouping,
    Reviewing,
}

/// Summary of pipeline results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Total files scanned
    pub total_photos: usize,
    /// Number of duplicate groups found
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding representatives)
    pub duplicate_count: usize,
    /// Potential space savings in bytes
    pub potential_savings_bytes: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Events emitted by the SessionStore as it observes orchestrator events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// The session moved to a new status
    StatusChanged { session_id: String, status: String },
    /// A checkpoint was written to disk
    Checkpointed { session_id: String, path: PathBuf },
    /// A prior session was found on startup and a recovery decision is needed
    RecoveryAvailable { session_id: String },
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Preparing => write!(f, "Preparing"),
            PipelinePhase::Indexing => write!(f, "Indexing"),
            PipelinePhase::Hashing => write!(f, "Hashing"),
            PipelinePhase::Grouping => write!(f, "Grouping"),
            PipelinePhase::Reviewing => write!(f, "Reviewing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Scan(ScanEvent::Progress(ScanProgress {
            directories_scanned: 10,
            photos_found: 50,
            current_path: PathBuf::from("/photos"),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Scan(ScanEvent::Progress(p)) => {
                assert_eq!(p.photos_found, 50);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn skipped_event_carries_reason() {
        let event = ScanEvent::Skipped {
            path: PathBuf::from("/photos/locked.jpg"),
            reason: "permission denied".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("permission denied"));
    }

    #[test]
    fn pipeline_summary_is_serializable() {
        let summary = PipelineSummary {
            total_photos: 1000,
            duplicate_groups: 50,
            duplicate_count: 150,
            potential_savings_bytes: 500_000_000,
            duration_ms: 5000,
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("500000000"));
    }
}
