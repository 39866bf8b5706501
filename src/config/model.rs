// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{FailureMode, HistoryStorageMode};

/// Separator between an included build's name and its task names
/// (`numbers:jar`).
pub const NAMESPACE_SEPARATOR: char = ':';

/// Raw configuration as read from a single TOML build file.
///
/// ```toml
/// [config]
/// parallelism = 4
/// failure_mode = "fail-at-end"
///
/// [default]
/// inputs = ["src/**"]
///
/// [include.numbers]
/// path = "libs/number-utils"
///
/// [task.compile]
/// cmd = "make compile"
/// depends_on = ["numbers:jar"]
/// outputs = ["build/**"]
/// ```
///
/// All sections are optional and have reasonable defaults. This type is
/// not validated; see [`ConfigFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// Composite-build includes from `[include.<name>]`.
    #[serde(default)]
    pub include: BTreeMap<String, IncludeConfig>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section. Only honoured in the root build file.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Upper bound on concurrently running tasks. `None` means "number of
    /// available CPUs".
    #[serde(default)]
    pub parallelism: Option<usize>,

    #[serde(default)]
    pub failure_mode: FailureMode,

    /// Whether the local result cache is used.
    #[serde(default = "default_build_cache")]
    pub build_cache: bool,

    #[serde(default)]
    pub history: HistoryStorageMode,

    /// Directory (relative to the build root) holding history and cache.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Tasks to run when none are requested on the command line.
    #[serde(default)]
    pub default_tasks: Vec<String>,
}

fn default_build_cache() -> bool {
    true
}

fn default_state_dir() -> String {
    ".dagbuild".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            parallelism: None,
            failure_mode: FailureMode::default(),
            build_cache: default_build_cache(),
            history: HistoryStorageMode::default(),
            state_dir: default_state_dir(),
            default_tasks: Vec::new(),
        }
    }
}

impl ConfigSection {
    /// Effective worker count: the configured value, else the machine's
    /// available parallelism, else 1.
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// `[default]` section: values applied to the tasks of the same build file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub cacheable: Option<bool>,

    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[include.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct IncludeConfig {
    /// Directory of the included build, relative to the including build.
    pub path: String,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// The command to execute (run through the platform shell).
    pub cmd: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Tasks that must complete before this one starts.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Input file globs, relative to the task directory.
    ///
    /// If `None`, the task uses `default.inputs`.
    #[serde(default)]
    pub inputs: Option<Vec<String>>,

    /// If true, `default.inputs` is appended to `task.inputs`.
    #[serde(default)]
    pub append_default_inputs: bool,

    /// Globs removed from the input set. If `None`, uses `default.exclude`.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    #[serde(default)]
    pub append_default_exclude: bool,

    /// Output file globs, relative to the task directory.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Declared input values that are not files.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    /// Extra environment for the command; also part of the fingerprint.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory relative to the build root.
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default)]
    pub cacheable: Option<bool>,

    /// Duration string such as `"30s"` or `"5m"`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Namespace of the included build this task came from (`None` for the
    /// root build). Filled in by the loader.
    #[serde(skip)]
    pub origin: Option<String>,
}

impl TaskConfig {
    /// Effective `cacheable` given the defaults of the task's build.
    pub fn effective_cacheable(&self, defaults: &DefaultSection) -> bool {
        self.cacheable.or(defaults.cacheable).unwrap_or(false)
    }

    /// Effective timeout string given the defaults of the task's build.
    pub fn effective_timeout<'a>(&'a self, defaults: &'a DefaultSection) -> Option<&'a str> {
        self.timeout.as_deref().or(defaults.timeout.as_deref())
    }

    /// Effective environment: defaults overlaid with task values.
    pub fn effective_env(&self, defaults: &DefaultSection) -> BTreeMap<String, String> {
        let mut env = defaults.env.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    pub fn effective_inputs(&self, defaults: &DefaultSection) -> Vec<String> {
        effective_patterns(self.inputs.as_ref(), &defaults.inputs, self.append_default_inputs)
    }

    pub fn effective_exclude(&self, defaults: &DefaultSection) -> Vec<String> {
        effective_patterns(self.exclude.as_ref(), &defaults.exclude, self.append_default_exclude)
    }
}

/// Decide the effective pattern list for one dimension (inputs or exclude).
fn effective_patterns(
    task_list: Option<&Vec<String>>,
    default_list: &[String],
    append_default: bool,
) -> Vec<String> {
    match (task_list, append_default) {
        (Some(list), true) => {
            let mut combined = list.clone();
            combined.extend(default_list.iter().cloned());
            combined
        }
        (Some(list), false) => list.clone(),
        (None, _) => default_list.to_vec(),
    }
}

/// An included build that was merged into the root configuration.
#[derive(Debug, Clone)]
pub struct IncludedBuild {
    /// Directory of the included build relative to the root build.
    pub dir: PathBuf,
    /// The included build's own `[default]` section.
    pub default: DefaultSection,
}

/// Validated configuration.
///
/// Tasks of included builds appear in [`ConfigFile::tasks`] under their
/// namespaced names; their `depends_on` entries are already namespaced.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    default: DefaultSection,
    includes: BTreeMap<String, IncludedBuild>,
    task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        includes: BTreeMap<String, IncludedBuild>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            default,
            includes,
            task,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn default_section(&self) -> &DefaultSection {
        &self.default
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn includes(&self) -> &BTreeMap<String, IncludedBuild> {
        &self.includes
    }

    /// Mutable access to the global section, for CLI overrides.
    pub fn config_section_mut(&mut self) -> &mut ConfigSection {
        &mut self.config
    }

    /// The `[default]` section that applies to `task`.
    pub fn defaults_for(&self, task: &TaskConfig) -> &DefaultSection {
        task.origin
            .as_ref()
            .and_then(|ns| self.includes.get(ns))
            .map(|inc| &inc.default)
            .unwrap_or(&self.default)
    }

    /// Directory (relative to the root build) whose paths `task` resolves
    /// against: the included build's dir joined with the task's `dir`.
    pub fn task_dir(&self, task: &TaskConfig) -> PathBuf {
        let base = task
            .origin
            .as_ref()
            .and_then(|ns| self.includes.get(ns))
            .map(|inc| inc.dir.clone())
            .unwrap_or_default();
        match &task.dir {
            Some(dir) => base.join(dir),
            None => base,
        }
    }

    /// Resolve the state directory against the build root.
    pub fn state_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.config.state_dir)
    }
}
