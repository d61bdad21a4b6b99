//! EXIF capture-date extraction for photos.
//!
//! Best-effort: a missing or unparseable tag just means `capture_date`
//! stays `None` on the `FileRecord`, it is never a hashing failure.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read `DateTimeOriginal`, falling back to `DateTime`, from a photo's EXIF
/// block.
pub fn capture_date(path: &Path) -> Option<DateTime<Utc>> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new()
        .read_from_container(&mut reader)
        .ok()?;

    let field = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .or_else(|| exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY))?;

    let text = field.display_value().to_string();
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_none() {
        assert!(capture_date(Path::new("/nonexistent/a.jpg")).is_none());
    }

    #[test]
    fn file_without_exif_returns_none() {
        let file = tempfile::NamedTempFile::with_suffix(".jpg").unwrap();
        std::fs::write(file.path(), b"not a real jpeg").unwrap();
        assert!(capture_date(file.path()).is_none());
    }
}
