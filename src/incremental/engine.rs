// src/incremental/engine.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use crate::cache::BuildCache;
use crate::dag::spec::TaskSpec;
use crate::fs::FileSystem;
use crate::incremental::decision::{decide, Decision, MustRunReason};
use crate::incremental::fingerprint::{input_fingerprint, output_fingerprint, output_matcher, Snapshot};
use crate::incremental::history::{HistoryRecord, HistoryStore};
use crate::incremental::patterns::collect_matching_files;

/// What the executor should do with a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation {
    /// Outputs match the last successful execution; nothing to do.
    UpToDate,
    /// Outputs were restored from the build cache.
    FromCache { restored: usize },
    /// The action has to run. `inputs` is handed back to
    /// [`IncrementalEngine::record_success`] afterwards.
    Execute {
        inputs: Snapshot,
        reason: MustRunReason,
    },
}

/// Up-to-date checks, history bookkeeping and cache use for tasks.
///
/// All methods do blocking IO and are meant to run on a blocking thread.
pub struct IncrementalEngine {
    fs: Arc<dyn FileSystem>,
    state_dir: PathBuf,
    history: Mutex<Box<dyn HistoryStore>>,
    cache: Option<BuildCache>,
    force: bool,
}

impl std::fmt::Debug for IncrementalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalEngine")
            .field("state_dir", &self.state_dir)
            .field("cache", &self.cache.is_some())
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

impl IncrementalEngine {
    pub fn new(fs: Arc<dyn FileSystem>, state_dir: impl Into<PathBuf>, history: Box<dyn HistoryStore>) -> Self {
        Self {
            fs,
            state_dir: state_dir.into(),
            history: Mutex::new(history),
            cache: None,
            force: false,
        }
    }

    /// Use `cache` for lookups and stores.
    pub fn with_cache(mut self, cache: BuildCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Ignore history and cache hits (`--rerun-tasks`). Outputs are still
    /// recorded and stored.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn history(&self) -> Result<MutexGuard<'_, Box<dyn HistoryStore>>> {
        self.history
            .lock()
            .map_err(|_| anyhow!("execution history lock poisoned"))
    }

    /// Last successful execution recorded for `task`.
    pub fn history_record(&self, task: &str) -> Result<Option<HistoryRecord>> {
        self.history()?.load(task)
    }

    /// Decide what to do with `spec` before it is dispatched.
    pub fn prepare(&self, spec: &TaskSpec) -> Result<Preparation> {
        let inputs = input_fingerprint(self.fs.as_ref(), spec, &self.state_dir)?;
        let record = self.history()?.load(&spec.name)?;

        // Outputs only matter when everything else already matches.
        let current_output = match &record {
            Some(r) if !self.force && spec.has_outputs() && r.input == inputs.fingerprint => Some(
                output_fingerprint(self.fs.as_ref(), spec, &self.state_dir)?.fingerprint,
            ),
            _ => None,
        };

        let reason = match decide(
            spec,
            record.as_ref(),
            &inputs.fingerprint,
            current_output.as_deref(),
            self.force,
        ) {
            Decision::UpToDate => {
                info!(task = %spec.name, "UP-TO-DATE");
                return Ok(Preparation::UpToDate);
            }
            Decision::MustRun(reason) => reason,
        };

        if reason != MustRunReason::Forced {
            if let Some(restored) = self.try_restore(spec, &inputs)? {
                return Ok(Preparation::FromCache { restored });
            }
        }

        debug!(task = %spec.name, %reason, input = %inputs.fingerprint, "task must run");
        Ok(Preparation::Execute { inputs, reason })
    }

    fn try_restore(&self, spec: &TaskSpec, inputs: &Snapshot) -> Result<Option<usize>> {
        let Some(cache) = self.cache.as_ref() else {
            return Ok(None);
        };
        if !spec.cacheable || !spec.has_outputs() {
            return Ok(None);
        }

        let entry = match cache.lookup(&inputs.fingerprint) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(task = %spec.name, error = %err, "unreadable build cache entry; treating as miss");
                invalidate_quietly(cache, spec, &inputs.fingerprint);
                return Ok(None);
            }
        };

        let matcher = output_matcher(spec, &self.state_dir)?;
        let stale: Vec<PathBuf> = collect_matching_files(self.fs.as_ref(), &spec.dir, &matcher)?
            .into_iter()
            .map(|(_, path)| path)
            .collect();

        let restored = match cache.restore(&entry, &spec.dir, &stale) {
            Ok(n) => n,
            Err(err) => {
                warn!(task = %spec.name, error = %err, "corrupt build cache entry; treating as miss");
                invalidate_quietly(cache, spec, &inputs.fingerprint);
                return Ok(None);
            }
        };

        let outputs = output_fingerprint(self.fs.as_ref(), spec, &self.state_dir)?;
        self.history()?.save(
            &spec.name,
            &HistoryRecord {
                input: inputs.fingerprint.clone(),
                output: outputs.fingerprint,
            },
        )?;
        info!(task = %spec.name, files = restored, "FROM-CACHE");
        Ok(Some(restored))
    }

    /// Record a successful execution and store cacheable outputs.
    ///
    /// A failure to store into the cache is logged, not returned.
    pub fn record_success(&self, spec: &TaskSpec, inputs: &Snapshot) -> Result<()> {
        let outputs = output_fingerprint(self.fs.as_ref(), spec, &self.state_dir)?;
        self.history()?.save(
            &spec.name,
            &HistoryRecord {
                input: inputs.fingerprint.clone(),
                output: outputs.fingerprint.clone(),
            },
        )?;

        if let Some(cache) = self.cache.as_ref() {
            if spec.cacheable && !outputs.files.is_empty() {
                if let Err(err) = cache.store(&inputs.fingerprint, &outputs.files) {
                    warn!(task = %spec.name, error = %err, "failed to store outputs in build cache");
                }
            } else if spec.cacheable {
                debug!(task = %spec.name, "no output files produced; nothing to cache");
            }
        }
        Ok(())
    }

    /// Forget the task's history so the next build runs it again.
    pub fn record_failure(&self, spec: &TaskSpec) -> Result<()> {
        self.history()?.remove(&spec.name)
    }

    /// Drop history of tasks that no longer exist.
    pub fn prune_history(&self, active_tasks: &[&str]) -> Result<()> {
        self.history()?.prune(active_tasks)
    }
}

/// A cache entry that cannot be dropped is still a miss for this build.
fn invalidate_quietly(cache: &BuildCache, spec: &TaskSpec, key: &str) {
    if let Err(err) = cache.invalidate(key) {
        warn!(task = %spec.name, error = %err, "failed to invalidate build cache entry");
    }
}
