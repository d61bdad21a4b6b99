//! # Scanner Module
//!
//! Streams media file observations from directory trees.
//!
//! ## Supported Extensions
//! Photo: jpg, jpeg, png, tiff, tif, gif, bmp, webp, heic, heif
//! Video: mp4, mov, avi, mkv, webm
//!
//! ## Example
//! ```rust,ignore
//! use photo_dedupe::core::scanner::{WalkDirScanner, PhotoScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let result = scanner.scan(&["/Users/photos".into()])?;
//! ```

mod filter;
mod walker;

pub use filter::MediaFilter;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// A single file observation produced by the Walker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileObservation {
    /// Absolute path to the observed file
    pub path: PathBuf,
    /// Whether this is a photo or a video
    pub media_type: MediaType,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub mtime: SystemTime,
    /// Creation time, when the platform exposes one
    pub ctime: Option<SystemTime>,
}

/// Coarse classification of a discovered media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Photo,
    Video,
}

/// Supported media formats, used to drive filtering and hashing dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaFormat {
    Jpeg,
    Png,
    WebP,
    Heic,
    Gif,
    Bmp,
    Tiff,
    Mp4,
    Mov,
    Avi,
    Mkv,
    WebM,
    Unknown,
}

impl MediaFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => MediaFormat::Jpeg,
            "png" => MediaFormat::Png,
            "webp" => MediaFormat::WebP,
            "heic" | "heif" => MediaFormat::Heic,
            "gif" => MediaFormat::Gif,
            "bmp" => MediaFormat::Bmp,
            "tiff" | "tif" => MediaFormat::Tiff,
            "mp4" => MediaFormat::Mp4,
            "mov" => MediaFormat::Mov,
            "avi" => MediaFormat::Avi,
            "mkv" => MediaFormat::Mkv,
            "webm" => MediaFormat::WebM,
            _ => MediaFormat::Unknown,
        }
    }

    /// Check if this format is supported at all.
    pub fn is_supported(&self) -> bool {
        !matches!(self, MediaFormat::Unknown)
    }

    /// Media type this format belongs to, if supported.
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            MediaFormat::Jpeg
            | MediaFormat::Png
            | MediaFormat::WebP
            | MediaFormat::Heic
            | MediaFormat::Gif
            | MediaFormat::Bmp
            | MediaFormat::Tiff => Some(MediaType::Photo),
            MediaFormat::Mp4 | MediaFormat::Mov | MediaFormat::Avi | MediaFormat::Mkv
            | MediaFormat::WebM => Some(MediaType::Video),
            MediaFormat::Unknown => None,
        }
    }
}

/// Result of a scan operation.
#[derive(Debug)]
pub struct ScanResult {
    /// Successfully discovered media files
    pub files: Vec<FileObservation>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for directory scanners.
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait PhotoScanner: Send + Sync {
    /// Scan directories and return discovered media files.
    fn scan(&self, paths: &[PathBuf]) -> Result<ScanResult, ScanError>;

    /// Scan with progress reporting via events.
    fn scan_with_events(
        &self,
        paths: &[PathBuf],
        events: &EventSender,
    ) -> Result<ScanResult, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_format_from_extension_lowercase() {
        assert_eq!(MediaFormat::from_extension("jpg"), MediaFormat::Jpeg);
        assert_eq!(MediaFormat::from_extension("jpeg"), MediaFormat::Jpeg);
        assert_eq!(MediaFormat::from_extension("png"), MediaFormat::Png);
        assert_eq!(MediaFormat::from_extension("heic"), MediaFormat::Heic);
        assert_eq!(MediaFormat::from_extension("mp4"), MediaFormat::Mp4);
    }

    #[test]
    fn media_format_from_extension_uppercase() {
        assert_eq!(MediaFormat::from_extension("JPG"), MediaFormat::Jpeg);
        assert_eq!(MediaFormat::from_extension("MOV"), MediaFormat::Mov);
    }

    #[test]
    fn unknown_extension_returns_unknown() {
        assert_eq!(MediaFormat::from_extension("txt"), MediaFormat::Unknown);
        assert_eq!(MediaFormat::from_extension("pdf"), MediaFormat::Unknown);
    }

    #[test]
    fn unknown_format_is_not_supported() {
        assert!(!MediaFormat::Unknown.is_supported());
        assert!(MediaFormat::Jpeg.is_supported());
        assert!(MediaFormat::Mp4.is_supported());
    }

    #[test]
    fn media_type_routes_photo_and_video() {
        assert_eq!(MediaFormat::Jpeg.media_type(), Some(MediaType::Photo));
        assert_eq!(MediaFormat::Mkv.media_type(), Some(MediaType::Video));
        assert_eq!(MediaFormat::Unknown.media_type(), None);
    }
}
