// src/incremental/hash.rs

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::fs::FileSystem;

/// Length of a hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the blake3 digest of a single file, streaming its contents.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute the blake3 digest of an in-memory buffer.
pub fn compute_bytes_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Whether `s` looks like a digest produced by this module.
pub fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn file_hash_matches_bytes_hash() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/a.txt", "hello");

        let from_file = compute_file_hash(&fs, Path::new("/proj/a.txt")).unwrap();
        assert_eq!(from_file, compute_bytes_hash(b"hello"));
        assert!(is_digest(&from_file));
    }

    #[test]
    fn missing_file_is_an_error() {
        let fs = MockFileSystem::new();
        assert!(compute_file_hash(&fs, Path::new("/proj/missing")).is_err());
    }
}
