// src/incremental/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

/// Directory names that are never scanned for inputs or outputs.
const ALWAYS_IGNORED_DIRS: &[&str] = &[".git"];

/// Compiled include/exclude glob patterns, evaluated against paths relative
/// to a task directory (e.g. `"src/main.rs"`).
#[derive(Clone)]
pub struct PathMatcher {
    include: GlobSet,
    exclude: Option<GlobSet>,
    include_count: usize,
    /// Absolute directories that are never descended into.
    ignored_dirs: Vec<PathBuf>,
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMatcher")
            .field("include_count", &self.include_count)
            .field("ignored_dirs", &self.ignored_dirs)
            .finish_non_exhaustive()
    }
}

impl PathMatcher {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include_set = build_globset(include).context("building include globset")?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };

        Ok(Self {
            include: include_set,
            exclude: exclude_set,
            include_count: include.len(),
            ignored_dirs: Vec::new(),
        })
    }

    /// Never scan below `dir` (typically the state directory).
    pub fn with_ignored_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ignored_dirs.push(dir.into());
        self
    }

    /// True when no include pattern was given; such a matcher matches nothing.
    pub fn is_empty(&self) -> bool {
        self.include_count == 0
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    fn is_ignored_dir(&self, dir: &Path) -> bool {
        let by_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| ALWAYS_IGNORED_DIRS.contains(&n));
        by_name || self.ignored_dirs.iter().any(|d| dir.starts_with(d))
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Convert `path` into a string relative to `root`, with forward slashes.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Collect all files under `root` matching `matcher`, as sorted
/// `(relative path, absolute path)` pairs.
///
/// A missing `root` yields no files. Ignored directories are skipped.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    matcher: &PathMatcher,
) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    if matcher.is_empty() || !fs.is_dir(root) {
        return Ok(files);
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                if !matcher.is_ignored_dir(&path) {
                    stack.push(path);
                }
            } else if fs.is_file(&path) {
                if let Some(rel) = relative_slash_path(root, &path) {
                    if matcher.matches(&rel) {
                        files.push((rel, path));
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
