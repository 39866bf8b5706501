#![allow(dead_code)]

use std::collections::BTreeMap;

use dagbuild::config::{
    ConfigFile, ConfigSection, DefaultSection, RawConfigFile, TaskConfig,
};
use dagbuild::types::{FailureMode, HistoryStorageMode};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                include: BTreeMap::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_default_input(mut self, pattern: &str) -> Self {
        self.config.default.inputs.push(pattern.to_string());
        self
    }

    pub fn with_default_exclude(mut self, pattern: &str) -> Self {
        self.config.default.exclude.push(pattern.to_string());
        self
    }

    pub fn with_default_cacheable(mut self, val: bool) -> Self {
        self.config.default.cacheable = Some(val);
        self
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.config.failure_mode = mode;
        self
    }

    pub fn with_parallelism(mut self, n: usize) -> Self {
        self.config.config.parallelism = Some(n);
        self
    }

    pub fn with_memory_history(mut self) -> Self {
        self.config.config.history = HistoryStorageMode::Memory;
        self
    }

    pub fn with_default_task(mut self, name: &str) -> Self {
        self.config.config.default_tasks.push(name.to_string());
        self
    }

    /// The raw (unvalidated) configuration.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                description: None,
                depends_on: vec![],
                inputs: None,
                append_default_inputs: false,
                exclude: None,
                append_default_exclude: false,
                outputs: vec![],
                properties: BTreeMap::new(),
                env: BTreeMap::new(),
                dir: None,
                cacheable: None,
                timeout: None,
                origin: None,
            },
        }
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.task.depends_on.push(dep.to_string());
        self
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.inputs.get_or_insert_with(Vec::new).push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.get_or_insert_with(Vec::new).push(pattern.to_string());
        self
    }

    pub fn output(mut self, pattern: &str) -> Self {
        self.task.outputs.push(pattern.to_string());
        self
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.task.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.task.dir = Some(dir.to_string());
        self
    }

    pub fn cacheable(mut self, val: bool) -> Self {
        self.task.cacheable = Some(val);
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.task.timeout = Some(duration.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
