//! File filtering logic for the scanner.

use super::MediaFormat;
use std::path::Path;

/// Filters files to determine if they are supported photos or videos.
pub struct MediaFilter {
    /// File extensions to include
    extensions: std::collections::HashSet<String>,
    /// Whether to include hidden files
    include_hidden: bool,
}

impl MediaFilter {
    /// Create a new filter with default supported extensions.
    pub fn new() -> Self {
        Self {
            extensions: vec![
                "jpg", "jpeg", "png", "webp", "heic", "heif", "gif", "bmp", "tiff", "tif", "mp4",
                "mov", "avi", "mkv", "webm",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Override the list of extensions to accept.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().collect();
        self
    }

    /// Check if a file should be included.
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    return false;
                }
            }
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.contains(&ext.to_lowercase()),
            None => false,
        }
    }

    /// Get the media format for a path.
    pub fn get_format(&self, path: &Path) -> MediaFormat {
        path.extension()
            .and_then(|e| e.to_str())
            .map(MediaFormat::from_extension)
            .unwrap_or(MediaFormat::Unknown)
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_includes_jpeg() {
        let filter = MediaFilter::new();
        assert!(filter.should_include(Path::new("/photos/image.jpg")));
        assert!(filter.should_include(Path::new("/photos/image.JPEG")));
    }

    #[test]
    fn filter_includes_video() {
        let filter = MediaFilter::new();
        assert!(filter.should_include(Path::new("/videos/clip.mp4")));
        assert!(filter.should_include(Path::new("/videos/clip.MKV")));
    }

    #[test]
    fn filter_excludes_non_media() {
        let filter = MediaFilter::new();
        assert!(!filter.should_include(Path::new("/photos/document.pdf")));
        assert!(!filter.should_include(Path::new("/photos/notes.txt")));
    }

    #[test]
    fn filter_excludes_hidden_by_default() {
        let filter = MediaFilter::new();
        assert!(!filter.should_include(Path::new("/photos/.hidden.jpg")));
    }

    #[test]
    fn filter_can_include_hidden() {
        let filter = MediaFilter::new().with_hidden(true);
        assert!(filter.should_include(Path::new("/photos/.hidden.jpg")));
    }

    #[test]
    fn filter_handles_no_extension() {
        let filter = MediaFilter::new();
        assert!(!filter.should_include(Path::new("/photos/no_extension")));
    }
}
