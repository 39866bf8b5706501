// src/incremental/fingerprint.rs

//! Input and output fingerprints of a task.
//!
//! The input fingerprint covers everything that can influence what a task
//! produces: the command, the declared output locations, the declared
//! properties and environment, and the content of every input file. Fields
//! are length-prefixed so that adjacent values cannot run into each other.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::trace;

use crate::dag::spec::TaskSpec;
use crate::fs::FileSystem;
use crate::incremental::hash::compute_file_hash;
use crate::incremental::patterns::{collect_matching_files, PathMatcher};

/// Bump when the fingerprint layout changes; old history then reads as
/// "inputs changed" instead of a false up-to-date.
pub const FINGERPRINT_VERSION: &str = "dagbuild-fingerprint-v1";

/// One hashed file, relative to the task directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub rel: String,
    pub path: PathBuf,
    pub digest: String,
}

/// Result of fingerprinting a set of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub fingerprint: String,
    /// Hashed files in sorted relative-path order.
    pub files: Vec<FileDigest>,
}

struct FieldHasher(Hasher);

impl FieldHasher {
    fn new() -> Self {
        Self(Hasher::new())
    }

    fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(&(bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
        self
    }

    fn finish(&self) -> String {
        self.0.finalize().to_hex().to_string()
    }
}

/// Matcher for a task's input files. Declared outputs are never inputs of
/// the same task.
pub fn input_matcher(spec: &TaskSpec, state_dir: &Path) -> Result<PathMatcher> {
    let mut exclude = spec.exclude.clone();
    exclude.extend(spec.outputs.iter().cloned());
    let matcher = PathMatcher::new(&spec.inputs, &exclude)
        .with_context(|| format!("compiling input patterns of task {}", spec.name))?;
    Ok(matcher.with_ignored_dir(state_dir))
}

pub fn output_matcher(spec: &TaskSpec, state_dir: &Path) -> Result<PathMatcher> {
    let matcher = PathMatcher::new(&spec.outputs, &[])
        .with_context(|| format!("compiling output patterns of task {}", spec.name))?;
    Ok(matcher.with_ignored_dir(state_dir))
}

fn hash_files(fs: &dyn FileSystem, root: &Path, matcher: &PathMatcher) -> Result<Vec<FileDigest>> {
    collect_matching_files(fs, root, matcher)?
        .into_iter()
        .map(|(rel, path)| {
            let digest = compute_file_hash(fs, &path)?;
            trace!(file = %rel, %digest, "hashed file");
            Ok(FileDigest { rel, path, digest })
        })
        .collect()
}

/// Fingerprint the declared inputs of `spec`.
pub fn input_fingerprint(fs: &dyn FileSystem, spec: &TaskSpec, state_dir: &Path) -> Result<Snapshot> {
    let matcher = input_matcher(spec, state_dir)?;
    let files = hash_files(fs, &spec.dir, &matcher)?;

    let mut h = FieldHasher::new();
    h.field(FINGERPRINT_VERSION.as_bytes())
        .field(spec.name.as_bytes())
        .field(spec.cmd.as_bytes());

    let mut outputs: Vec<&String> = spec.outputs.iter().collect();
    outputs.sort();
    h.field(&(outputs.len() as u64).to_le_bytes());
    for glob in outputs {
        h.field(glob.as_bytes());
    }

    h.field(&(spec.properties.len() as u64).to_le_bytes());
    for (key, value) in spec.properties.iter() {
        h.field(key.as_bytes()).field(value.as_bytes());
    }

    h.field(&(spec.env.len() as u64).to_le_bytes());
    for (key, value) in spec.env.iter() {
        h.field(key.as_bytes()).field(value.as_bytes());
    }

    h.field(&(files.len() as u64).to_le_bytes());
    for file in files.iter() {
        h.field(file.rel.as_bytes()).field(file.digest.as_bytes());
    }

    Ok(Snapshot {
        fingerprint: h.finish(),
        files,
    })
}

/// Fingerprint the files currently matching the output globs of `spec`.
pub fn output_fingerprint(fs: &dyn FileSystem, spec: &TaskSpec, state_dir: &Path) -> Result<Snapshot> {
    let matcher = output_matcher(spec, state_dir)?;
    let files = hash_files(fs, &spec.dir, &matcher)?;
    Ok(Snapshot {
        fingerprint: fingerprint_of_files(&files),
        files,
    })
}

/// Fingerprint of a list of already hashed files (sorted by the caller).
pub fn fingerprint_of_files(files: &[FileDigest]) -> String {
    let mut h = FieldHasher::new();
    h.field(FINGERPRINT_VERSION.as_bytes());
    h.field(&(files.len() as u64).to_le_bytes());
    for file in files {
        h.field(file.rel.as_bytes()).field(file.digest.as_bytes());
    }
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::collections::BTreeMap;

    fn spec() -> TaskSpec {
        TaskSpec {
            name: "compile".into(),
            cmd: "make".into(),
            description: None,
            dir: PathBuf::from("/proj"),
            inputs: vec!["src/**".into()],
            exclude: Vec::new(),
            outputs: vec!["build/**".into()],
            properties: BTreeMap::from([("target".to_string(), "17".to_string())]),
            env: BTreeMap::new(),
            cacheable: true,
            timeout: None,
            deps: Vec::new(),
        }
    }

    fn state() -> PathBuf {
        PathBuf::from("/proj/.dagbuild")
    }

    #[test]
    fn independent_of_insertion_order() {
        let a = MockFileSystem::new();
        a.add_file("/proj/src/x.c", "x");
        a.add_file("/proj/src/y.c", "y");

        let b = MockFileSystem::new();
        b.add_file("/proj/src/y.c", "y");
        b.add_file("/proj/src/x.c", "x");

        let fa = input_fingerprint(&a, &spec(), &state()).unwrap();
        let fb = input_fingerprint(&b, &spec(), &state()).unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn declared_values_change_the_fingerprint() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/x.c", "x");
        let base = input_fingerprint(&fs, &spec(), &state()).unwrap().fingerprint;

        let mut changed = spec();
        changed.properties.insert("target".into(), "21".into());
        assert_ne!(base, input_fingerprint(&fs, &changed, &state()).unwrap().fingerprint);

        let mut changed = spec();
        changed.cmd = "make all".into();
        assert_ne!(base, input_fingerprint(&fs, &changed, &state()).unwrap().fingerprint);

        let mut changed = spec();
        changed.env.insert("CC".into(), "clang".into());
        assert_ne!(base, input_fingerprint(&fs, &changed, &state()).unwrap().fingerprint);
    }

    #[test]
    fn outputs_are_not_inputs() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/x.c", "x");
        let mut s = spec();
        s.inputs = vec!["**".into()];

        let before = input_fingerprint(&fs, &s, &state()).unwrap().fingerprint;
        fs.add_file("/proj/build/x.o", "obj");
        let after = input_fingerprint(&fs, &s, &state()).unwrap().fingerprint;
        assert_eq!(before, after);
    }

    #[test]
    fn output_fingerprint_tracks_content() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/build/out.bin", "1");
        let first = output_fingerprint(&fs, &spec(), &state()).unwrap();
        assert_eq!(first.files.len(), 1);

        fs.add_file("/proj/build/out.bin", "2");
        let second = output_fingerprint(&fs, &spec(), &state()).unwrap();
        assert_ne!(first.fingerprint, second.fingerprint);
    }
}
