//! # Session Module
//!
//! The scan session state machine: `idle -> scanning -> awaitingReview ->
//! completed`, with `cancelled`/`failed` branches. `SessionStore` drives
//! transitions and checkpoints progress to durable storage and to a JSON
//! file, so a crashed or cancelled scan can be resumed on the next run.

mod store;
mod types;

pub use store::{read_checkpoint_file, write_checkpoint_file, SessionStore};
pub use types::{
    DuplicateSummary, FolderProgress, FolderStatus, Metrics, Phase, RecoveryDecision,
    RecoveryStrategy, Session, SessionStatus,
};
