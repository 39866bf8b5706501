// src/config/validate.rs

use std::collections::BTreeMap;

use globset::Glob;

use crate::config::model::{
    ConfigFile, ConfigSection, DefaultSection, IncludedBuild, RawConfigFile, TaskConfig,
    NAMESPACE_SEPARATOR,
};
use crate::dag::graph::find_cycle;
use crate::errors::{DagbuildError, Result};
use crate::exec::duration::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DagbuildError;

    /// Validate a single build file. Includes need a location on disk to
    /// resolve against, so they are only accepted through
    /// [`crate::config::load_and_validate`].
    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        if let Some(name) = raw.include.keys().next() {
            return Err(DagbuildError::ConfigError(format!(
                "include '{}' can only be resolved when loading from a file",
                name
            )));
        }
        validate_composed(raw.config, raw.default, BTreeMap::new(), raw.task)
    }
}

/// Validate a fully merged configuration and seal it into a [`ConfigFile`].
pub(crate) fn validate_composed(
    config: ConfigSection,
    default: DefaultSection,
    includes: BTreeMap<String, IncludedBuild>,
    task: BTreeMap<String, TaskConfig>,
) -> Result<ConfigFile> {
    let cfg = ConfigFile::new_unchecked(config, default, includes, task);

    ensure_has_tasks(&cfg)?;
    validate_global_config(&cfg)?;
    validate_task_names(&cfg)?;
    validate_task_dependencies(&cfg)?;
    validate_task_settings(&cfg)?;
    validate_dag(&cfg)?;

    Ok(cfg)
}

/// Names declared in a single build file: non-empty, no whitespace and no
/// namespace separator.
pub(crate) fn validate_local_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DagbuildError::ConfigError(format!(
            "{kind} names must not be empty"
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(DagbuildError::ConfigError(format!(
            "{kind} name '{name}' must not contain whitespace"
        )));
    }
    if name.contains(NAMESPACE_SEPARATOR) {
        return Err(DagbuildError::ConfigError(format!(
            "{kind} name '{name}' must not contain '{NAMESPACE_SEPARATOR}'"
        )));
    }
    Ok(())
}

fn ensure_has_tasks(cfg: &ConfigFile) -> Result<()> {
    if cfg.tasks().is_empty() {
        return Err(DagbuildError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigFile) -> Result<()> {
    let section = cfg.config_section();

    if section.parallelism == Some(0) {
        return Err(DagbuildError::ConfigError(
            "[config].parallelism must be >= 1 (got 0)".to_string(),
        ));
    }

    if section.state_dir.trim().is_empty() {
        return Err(DagbuildError::ConfigError(
            "[config].state_dir must not be empty".to_string(),
        ));
    }

    for name in section.default_tasks.iter() {
        if !cfg.tasks().contains_key(name) {
            return Err(DagbuildError::ConfigError(format!(
                "[config].default_tasks entry '{}' does not name a task",
                name
            )));
        }
    }

    Ok(())
}

fn validate_task_names(cfg: &ConfigFile) -> Result<()> {
    for (name, task) in cfg.tasks().iter() {
        // Included tasks were checked (and namespaced) by the loader.
        if task.origin.is_none() {
            validate_local_name("task", name)?;
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &ConfigFile) -> Result<()> {
    for (name, task) in cfg.tasks().iter() {
        for dep in task.depends_on.iter() {
            if dep == name {
                return Err(DagbuildError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `depends_on`",
                    name
                )));
            }
            if !cfg.tasks().contains_key(dep) {
                return Err(DagbuildError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `depends_on`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_task_settings(cfg: &ConfigFile) -> Result<()> {
    for (name, task) in cfg.tasks().iter() {
        let defaults = cfg.defaults_for(task);

        if task.cmd.trim().is_empty() {
            return Err(DagbuildError::ConfigError(format!(
                "task '{}' has an empty `cmd`",
                name
            )));
        }

        if let Some(timeout) = task.effective_timeout(defaults) {
            parse_duration(timeout).map_err(|e| {
                DagbuildError::ConfigError(format!("task '{}' has invalid timeout: {}", name, e))
            })?;
        }

        let patterns = task
            .effective_inputs(defaults)
            .into_iter()
            .chain(task.effective_exclude(defaults))
            .chain(task.outputs.iter().cloned());
        for pattern in patterns {
            Glob::new(&pattern).map_err(|e| {
                DagbuildError::ConfigError(format!(
                    "task '{}' has invalid glob pattern '{}': {}",
                    name, pattern, e
                ))
            })?;
        }

        if task.effective_cacheable(defaults) && task.outputs.is_empty() {
            return Err(DagbuildError::ConfigError(format!(
                "task '{}' is cacheable but declares no `outputs`",
                name
            )));
        }
    }
    Ok(())
}

fn validate_dag(cfg: &ConfigFile) -> Result<()> {
    let edges: BTreeMap<&str, Vec<&str>> = cfg
        .tasks()
        .iter()
        .map(|(name, task)| {
            (
                name.as_str(),
                task.depends_on.iter().map(String::as_str).collect(),
            )
        })
        .collect();

    match find_cycle(&edges) {
        None => Ok(()),
        Some(cycle) => Err(DagbuildError::DagCycle(format!(
            "cycle detected in task graph: {}",
            cycle.join(" -> ")
        ))),
    }
}
