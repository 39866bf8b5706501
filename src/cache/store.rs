// src/cache/store.rs

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::incremental::fingerprint::FileDigest;
use crate::incremental::hash::{compute_bytes_hash, is_digest};

/// Directory name of the cache inside the state directory.
pub const CACHE_DIR_NAME: &str = "cache";
const MANIFEST_FILE: &str = "manifest";
const FILES_DIR: &str = "files";

/// One file recorded in a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub rel: String,
    pub digest: String,
}

/// A complete cache entry, as described by its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub files: Vec<CachedFile>,
}

/// Local result cache keyed by input fingerprint.
///
/// Layout: `<state_dir>/cache/<key>/files/<relpath>` plus
/// `<state_dir>/cache/<key>/manifest`. The manifest is written last; an
/// entry without one does not exist.
#[derive(Debug, Clone)]
pub struct BuildCache {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl BuildCache {
    pub fn new(state_dir: &Path, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: state_dir.join(CACHE_DIR_NAME),
            fs,
        }
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn manifest_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join(MANIFEST_FILE)
    }

    fn file_path(&self, key: &str, rel: &str) -> PathBuf {
        self.entry_dir(key).join(FILES_DIR).join(rel)
    }

    /// Look up the entry for `key`. A malformed manifest is an error.
    pub fn lookup(&self, key: &str) -> Result<Option<CacheEntry>> {
        if !is_digest(key) {
            bail!("invalid cache key {key:?}");
        }

        let manifest = self.manifest_path(key);
        if !self.fs.is_file(&manifest) {
            return Ok(None);
        }

        let content = self
            .fs
            .read_to_string(&manifest)
            .with_context(|| format!("reading cache manifest {:?}", manifest))?;

        let mut files = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let (digest, rel) = line
                .split_once(' ')
                .ok_or_else(|| anyhow!("malformed manifest line in {:?}: {line:?}", manifest))?;
            if !is_digest(digest) || !is_safe_relative(rel) {
                bail!("malformed manifest line in {:?}: {line:?}", manifest);
            }
            files.push(CachedFile {
                rel: rel.to_string(),
                digest: digest.to_string(),
            });
        }

        Ok(Some(CacheEntry {
            key: key.to_string(),
            files,
        }))
    }

    /// Store `files` under `key`. Existing entries are left untouched.
    pub fn store(&self, key: &str, files: &[FileDigest]) -> Result<()> {
        if !is_digest(key) {
            bail!("invalid cache key {key:?}");
        }
        if self.fs.is_file(&self.manifest_path(key)) {
            debug!(key, "cache entry already present; not storing again");
            return Ok(());
        }

        let mut manifest = String::new();
        for file in files {
            if !is_safe_relative(&file.rel) {
                bail!("refusing to cache output outside the task directory: {}", file.rel);
            }
            let bytes = self
                .fs
                .read(&file.path)
                .with_context(|| format!("reading output {:?} for caching", file.path))?;
            let digest = compute_bytes_hash(&bytes);
            if digest != file.digest {
                bail!("output {} changed while it was being cached", file.rel);
            }
            self.fs.write(&self.file_path(key, &file.rel), &bytes)?;
            manifest.push_str(&format!("{} {}\n", digest, file.rel));
        }

        self.fs.write(&self.manifest_path(key), manifest.as_bytes())?;
        info!(key, files = files.len(), "stored task outputs in build cache");
        Ok(())
    }

    /// Copy the files of `entry` into `dest_dir`, verifying each digest
    /// first. Nothing is written or removed when any cached file is missing
    /// or corrupt.
    ///
    /// `stale` lists the files currently matching the task's outputs. Those
    /// not part of the entry are removed, so the output tree ends up exactly
    /// as the cached execution left it.
    pub fn restore(&self, entry: &CacheEntry, dest_dir: &Path, stale: &[PathBuf]) -> Result<usize> {
        let mut verified = Vec::with_capacity(entry.files.len());
        for file in entry.files.iter() {
            let src = self.file_path(&entry.key, &file.rel);
            let bytes = self
                .fs
                .read(&src)
                .with_context(|| format!("reading cached file {:?}", src))?;
            if compute_bytes_hash(&bytes) != file.digest {
                bail!("cached file {} of entry {} is corrupt", file.rel, entry.key);
            }
            verified.push((dest_dir.join(&file.rel), bytes));
        }

        for path in stale {
            if !verified.iter().any(|(dest, _)| dest == path) && self.fs.is_file(path) {
                debug!(path = ?path, "removing output not produced by the cached execution");
                self.fs.remove_file(path)?;
            }
        }
        for (dest, bytes) in verified.iter() {
            self.fs.write(dest, bytes)?;
        }
        debug!(key = %entry.key, files = verified.len(), "restored outputs from build cache");
        Ok(verified.len())
    }

    /// Make an entry invisible by removing its manifest.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        let manifest = self.manifest_path(key);
        if self.fs.is_file(&manifest) {
            self.fs.remove_file(&manifest)?;
            info!(key, "invalidated build cache entry");
        }
        Ok(())
    }
}

/// Relative, forward-only paths (no `..`, no root, no drive prefix).
fn is_safe_relative(rel: &str) -> bool {
    !rel.is_empty()
        && Path::new(rel)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}
