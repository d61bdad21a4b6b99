//! # Error Module
//!
//! User-friendly, component-scoped error types for the duplicate scan
//! pipeline.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum DuplicateFinderError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur during directory walking
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan was cancelled")]
    Cancelled,
}

/// Errors that occur while computing content or perceptual signatures
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Unsupported media format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to decode {path}: {reason}")]
    DecodeFailed { path: PathBuf, reason: String },

    #[error("{path} is empty or has zero dimensions")]
    EmptyMedia { path: PathBuf },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),

    #[error("Failed to open {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decoding {path} timed out after {secs}s")]
    DecodeTimeout { path: PathBuf, secs: u64 },

    #[error("Hashing was cancelled")]
    Cancelled,
}

/// Errors raised by the BK-tree / similarity index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Unknown algorithm partition: {0:?}")]
    UnknownAlgorithm(crate::core::hasher::HashAlgorithmKind),
}

/// Errors that occur during duplicate comparison / grouping
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("No files to compare")]
    NoFiles,

    #[error("Invalid radius: {value} (must be 0-64)")]
    InvalidRadius { value: u32 },

    #[error("Invalid confidence floor: {value} (must be in [0,1])")]
    InvalidConfidenceFloor { value: f64 },

    #[error("Comparison was cancelled")]
    Cancelled,
}

/// Errors that occur in the session state machine
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Failed to read session checkpoint {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Failed to write session checkpoint {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Session checkpoint {path} is missing required field: {field}")]
    MissingField { path: PathBuf, field: String },

    #[error("Session {id} not found")]
    NotFound { id: String },
}

/// Errors that occur with the durable file/signature store
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to open database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Database corruption detected at {path}. Delete this file and rescan.")]
    Corrupted { path: PathBuf },

    #[error("Failed to serialize row data: {0}")]
    SerializationFailed(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, DuplicateFinderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/photos/vacation"),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/vacation"));
    }

    #[test]
    fn hash_error_includes_path_and_reason() {
        let error = HashError::DecodeFailed {
            path: PathBuf::from("/photos/broken.jpg"),
            reason: "invalid JPEG".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/broken.jpg"));
        assert!(message.contains("invalid JPEG"));
    }

    #[test]
    fn persistence_error_suggests_recovery() {
        let error = PersistenceError::Corrupted {
            path: PathBuf::from("/cache/hashes.db"),
        };
        let message = error.to_string();
        assert!(message.contains("Delete this file"));
    }

    #[test]
    fn session_error_invalid_transition_names_states() {
        let error = SessionError::InvalidTransition {
            from: "completed".to_string(),
            to: "scanning".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("completed"));
        assert!(message.contains("scanning"));
    }
}
