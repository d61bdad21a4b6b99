//! Streamed BLAKE3 content hashing.
//!
//! `content_hash(a) == content_hash(b)` implies the two files are
//! byte-identical. Bytes are read in fixed-size chunks so a multi-gigabyte
//! video never needs to be loaded into memory at once.

use crate::error::HashError;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the 256-bit BLAKE3 digest of a file's contents.
pub fn content_hash(path: &Path) -> Result<[u8; 32], HashError> {
    let mut file = File::open(path).map_err(|e| HashError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).map_err(|e| HashError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn identical_content_hashes_match() {
        let mut file_a = NamedTempFile::new().unwrap();
        file_a.write_all(b"same bytes").unwrap();
        let mut file_b = NamedTempFile::new().unwrap();
        file_b.write_all(b"same bytes").unwrap();

        let hash_a = content_hash(file_a.path()).unwrap();
        let hash_b = content_hash(file_b.path()).unwrap();

        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn different_content_hashes_differ() {
        let mut file_a = NamedTempFile::new().unwrap();
        file_a.write_all(b"alpha").unwrap();
        let mut file_b = NamedTempFile::new().unwrap();
        file_b.write_all(b"beta").unwrap();

        let hash_a = content_hash(file_a.path()).unwrap();
        let hash_b = content_hash(file_b.path()).unwrap();

        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn hashes_file_larger_than_chunk_size() {
        let mut file = NamedTempFile::new().unwrap();
        let data = vec![0x42u8; CHUNK_SIZE * 3 + 17];
        file.write_all(&data).unwrap();

        let hash = content_hash(file.path()).unwrap();
        let expected = blake3::hash(&data);
        assert_eq!(&hash, expected.as_bytes());
    }

    #[test]
    fn missing_file_returns_io_error() {
        let result = content_hash(Path::new("/nonexistent/path/to/file.jpg"));
        assert!(matches!(result, Err(HashError::IoError { .. })));
    }
}
