// src/dag/spec.rs

//! Resolved, immutable description of one task.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::{ConfigFile, TaskConfig};
use crate::engine::TaskName;
use crate::errors::{DagbuildError, Result};
use crate::exec::duration::parse_duration;

/// A task with every default applied and every path resolved.
///
/// Built once per invocation and shared (`Arc<TaskSpec>`) between the
/// graph, the scheduler, the incremental engine and the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: TaskName,
    pub cmd: String,
    pub description: Option<String>,
    /// Working directory; input and output globs are relative to it.
    pub dir: PathBuf,
    pub inputs: Vec<String>,
    pub exclude: Vec<String>,
    pub outputs: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub cacheable: bool,
    pub timeout: Option<Duration>,
    /// Direct dependencies (`depends_on`), namespaced.
    pub deps: Vec<TaskName>,
}

impl TaskSpec {
    /// Resolve a validated task against the build root.
    pub fn from_config(name: &str, cfg: &ConfigFile, task: &TaskConfig, root: &Path) -> Result<Self> {
        let defaults = cfg.defaults_for(task);

        let timeout = task
            .effective_timeout(defaults)
            .map(parse_duration)
            .transpose()
            .map_err(|e| {
                DagbuildError::ConfigError(format!("task '{}' has invalid timeout: {}", name, e))
            })?;

        let rel = cfg.task_dir(task);
        let dir = if rel.as_os_str().is_empty() {
            root.to_path_buf()
        } else {
            root.join(rel)
        };

        Ok(Self {
            name: name.to_string(),
            cmd: task.cmd.clone(),
            description: task.description.clone(),
            dir,
            inputs: task.effective_inputs(defaults),
            exclude: task.effective_exclude(defaults),
            outputs: task.outputs.clone(),
            properties: task.properties.clone(),
            env: task.effective_env(defaults),
            cacheable: task.effective_cacheable(defaults),
            timeout,
            deps: task.depends_on.clone(),
        })
    }

    /// Tasks without declared outputs are never considered up-to-date.
    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }
}
