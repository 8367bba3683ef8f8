//! Streamed file digests
//!
//! The sole correctness gate before any destructive file replacement.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::UpdateError;

const BLOCK_SIZE: usize = 8192;

/// Compute the SHA-256 digest of a file as a lowercase hex string.
///
/// The file is streamed in fixed-size blocks so memory use is independent
/// of file size.
///
/// # Errors
/// Returns `UpdateError::Io` if the path is unreadable.
pub fn file_digest(path: &Path) -> Result<String, UpdateError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BLOCK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn digest_is_deterministic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hostforge artifact contents").unwrap();

        let first = file_digest(file.path()).unwrap();
        let second = file_digest(file.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_matches_known_vector() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();

        assert_eq!(
            file_digest(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn different_bytes_different_digest() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"one").unwrap();
        b.write_all(b"two").unwrap();

        assert_ne!(
            file_digest(a.path()).unwrap(),
            file_digest(b.path()).unwrap()
        );
    }

    #[test]
    fn unreadable_path_is_io_error() {
        let err = file_digest(Path::new("/nonexistent/artifact")).unwrap_err();
        assert!(matches!(err, UpdateError::Io(_)));
    }
}
