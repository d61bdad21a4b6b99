//! Directory walking implementation using walkdir.

use super::{filter::MediaFilter, FileObservation, MediaType, PhotoScanner, ScanResult};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent, ScanProgress};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

/// Configuration for the directory scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: false,
            max_depth: None,
            extensions: None,
        }
    }
}

/// Scanner implementation using the walkdir crate.
///
/// Follows no symlinks by default, so traversal cycles are impossible.
/// Each path is emitted at most once per scan.
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: MediaFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration.
    pub fn new(config: ScanConfig) -> Self {
        let mut filter = MediaFilter::new().with_hidden(config.include_hidden);

        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions.clone());
        }

        Self { config, filter }
    }

    /// Walk a single root directory, pushing observations onto `sender` as
    /// they are discovered. Honors `cancelled` at each observation boundary:
    /// when set, the walk stops and the caller may resume the subtree later
    /// since walkdir re-enumerates from the filesystem rather than from any
    /// saved cursor.
    pub fn walk_streaming(
        &self,
        root: &PathBuf,
        sender: &crossbeam_channel::Sender<FileObservation>,
        cancelled: &Arc<AtomicBool>,
        events: Option<&EventSender>,
    ) -> Result<Vec<ScanError>, ScanError> {
        if !root.exists() || !root.is_dir() {
            return Err(ScanError::DirectoryNotFound { path: root.clone() });
        }

        let mut errors = Vec::new();
        let mut directories_scanned = 0;
        let mut files_found = 0;

        let mut walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        for entry_result in walker {
            if cancelled.load(Ordering::Relaxed) {
                return Err(ScanError::Cancelled);
            }

            match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    if path.is_dir() {
                        directories_scanned += 1;
                        if !self.config.include_hidden && !is_root_or_visible(path, root) {
                            continue;
                        }
                        if let Some(sender) = events {
                            sender.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                                directories_scanned,
                                photos_found: files_found,
                                current_path: path.to_path_buf(),
                            })));
                        }
                        continue;
                    }

                    if !self.filter.should_include(path) {
                        continue;
                    }

                    match observation_for(path, &self.filter) {
                        Ok(Some(observation)) => {
                            if let Some(sender) = events {
                                sender.send(Event::Scan(ScanEvent::FileFound {
                                    path: observation.path.clone(),
                                }));
                            }
                            files_found += 1;
                            // A full channel means the hasher pool is behind;
                            // block here so the walker applies backpressure.
                            let _ = sender.send(observation);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            if let Some(sender) = events {
                                sender.send(Event::Scan(ScanEvent::Skipped {
                                    path: path.to_path_buf(),
                                    reason: e.to_string(),
                                }));
                            }
                            errors.push(e);
                        }
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path: path.clone() }
                    } else {
                        ScanError::ReadDirectory {
                            path: path.clone(),
                            source: std::io::Error::other(e.to_string()),
                        }
                    };

                    if let Some(sender) = events {
                        sender.send(Event::Scan(ScanEvent::Skipped {
                            path,
                            reason: error.to_string(),
                        }));
                    }
                    errors.push(error);
                }
            }
        }

        Ok(errors)
    }

    /// Scan a single directory into an in-memory vector (used by the
    /// collecting `PhotoScanner` impl and by tests).
    fn scan_directory(
        &self,
        root: &PathBuf,
        events: Option<&EventSender>,
    ) -> Result<(Vec<FileObservation>, Vec<ScanError>), ScanError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancelled = Arc::new(AtomicBool::new(false));
        let errors = self.walk_streaming(root, &tx, &cancelled, events)?;
        drop(tx);
        let files: Vec<_> = rx.iter().collect();
        Ok((files, errors))
    }
}

fn is_root_or_visible(path: &std::path::Path, root: &std::path::Path) -> bool {
    if path == root {
        return true;
    }
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => !name.starts_with('.'),
        None => true,
    }
}

fn observation_for(
    path: &std::path::Path,
    filter: &MediaFilter,
) -> Result<Option<FileObservation>, ScanError> {
    let format = filter.get_format(path);
    let media_type = match format.media_type() {
        Some(mt) => mt,
        None => return Ok(None),
    };

    let metadata = fs::metadata(path).map_err(|e| ScanError::ReadDirectory {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(Some(FileObservation {
        path: path.to_path_buf(),
        media_type,
        size: metadata.len(),
        mtime: metadata
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        ctime: metadata.created().ok(),
    }))
}

impl PhotoScanner for WalkDirScanner {
    fn scan(&self, paths: &[PathBuf]) -> Result<ScanResult, ScanError> {
        self.scan_with_events(paths, &crate::events::null_sender())
    }

    fn scan_with_events(
        &self,
        paths: &[PathBuf],
        events: &EventSender,
    ) -> Result<ScanResult, ScanError> {
        events.send(Event::Scan(ScanEvent::Started {
            paths: paths.to_vec(),
        }));

        let mut all_files = Vec::new();
        let mut all_errors = Vec::new();

        for path in paths {
            match self.scan_directory(path, Some(events)) {
                Ok((files, errors)) => {
                    all_files.extend(files);
                    all_errors.extend(errors);
                }
                Err(e) => all_errors.push(e),
            }
        }

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: all_files.len(),
        }));

        Ok(ScanResult {
            files: all_files,
            errors: all_errors,
        })
    }
}
