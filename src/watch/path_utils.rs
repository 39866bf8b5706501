// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// A direct `strip_prefix(root)` is tried first. If that fails (symlinks,
/// `/private/var` vs `/var` on macOS), both paths are canonicalized and
/// compared again. Returns `None` if the path is not below `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

/// Canonicalize `path` if it exists, otherwise return it unchanged.
pub fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_with_forward_slashes() {
        assert_eq!(
            relative_str(Path::new("/proj/app"), Path::new("/proj/app/src/main.c")),
            Some("src/main.c".to_string())
        );
        assert_eq!(
            relative_str(Path::new("/proj/app"), Path::new("/elsewhere/x")),
            None
        );
    }
}
