// src/config/loader.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, IncludeConfig, IncludedBuild, RawConfigFile, TaskConfig};
use crate::config::validate::{validate_composed, validate_local_name};
use crate::errors::{DagbuildError, Result};
use crate::watch::path_utils::canonical_or_self;

/// File name of a build file; also what an `[include.<name>]` directory
/// must contain.
pub const BUILD_FILE_NAME: &str = "Dagbuild.toml";

/// Load a build file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** resolve
/// includes or perform semantic validation. Use [`load_and_validate`] for
/// that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a build file, merge every included build into it and validate the
/// result.
///
/// Included tasks are renamed to `<include>:<task>` and their dependencies
/// are rewritten into the same namespace, so the returned [`ConfigFile`] is
/// one flat task map.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;

    let mut includes = BTreeMap::new();
    let mut tasks = raw.task.clone();
    let root_file = canonical_or_self(path);
    let mut chain = vec![root_file.clone()];
    let mut seen = BTreeMap::from([(root_file, String::new())]);

    merge_includes(
        &build_dir_of(path),
        &raw.include,
        None,
        Path::new(""),
        &mut chain,
        &mut seen,
        &mut includes,
        &mut tasks,
    )?;

    validate_composed(raw.config, raw.default, includes, tasks)
}

/// Directory a build file's relative paths are resolved against.
///
/// - `"configs/Dagbuild.toml"` resolves against `"configs"`.
/// - A bare `"Dagbuild.toml"` (parent = "") resolves against the current
///   working directory.
pub fn build_dir_of(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[allow(clippy::too_many_arguments)]
fn merge_includes(
    base_dir: &Path,
    include: &BTreeMap<String, IncludeConfig>,
    prefix: Option<&str>,
    rel_dir: &Path,
    chain: &mut Vec<PathBuf>,
    seen: &mut BTreeMap<PathBuf, String>,
    out_includes: &mut BTreeMap<String, IncludedBuild>,
    out_tasks: &mut BTreeMap<String, TaskConfig>,
) -> Result<()> {
    for (name, inc) in include.iter() {
        validate_local_name("include", name)?;
        let namespace = match prefix {
            Some(p) => format!("{p}:{name}"),
            None => name.clone(),
        };

        let dir = base_dir.join(&inc.path);
        let file = dir.join(BUILD_FILE_NAME);
        if !file.is_file() {
            return Err(DagbuildError::ConfigError(format!(
                "include '{}' points to {:?}, which has no {}",
                namespace, dir, BUILD_FILE_NAME
            )));
        }

        let canonical = canonical_or_self(&file);
        if chain.contains(&canonical) {
            return Err(DagbuildError::ConfigError(format!(
                "include '{}' refers back to {:?}, which is already being included",
                namespace, file
            )));
        }
        // An included build is identified by its directory; two namespaces
        // for one build would run the same tasks twice against one tree.
        if let Some(first) = seen.get(&canonical) {
            let first = if first.is_empty() { "the root build" } else { first.as_str() };
            return Err(DagbuildError::ConfigError(format!(
                "include '{}' refers to {:?}, which is already included as '{}'",
                namespace, file, first
            )));
        }
        seen.insert(canonical.clone(), namespace.clone());

        debug!(include = %namespace, path = ?file, "loading included build");
        let raw = load_from_path(&file)?;
        let inc_rel_dir = rel_dir.join(&inc.path);

        out_includes.insert(
            namespace.clone(),
            IncludedBuild {
                dir: inc_rel_dir.clone(),
                default: raw.default.clone(),
            },
        );

        for (task_name, task) in raw.task.iter() {
            validate_local_name("task", task_name)?;
            let full_name = format!("{namespace}:{task_name}");
            if out_tasks.contains_key(&full_name) {
                return Err(DagbuildError::ConfigError(format!(
                    "task '{}' is defined more than once",
                    full_name
                )));
            }

            let mut task = task.clone();
            task.depends_on = task
                .depends_on
                .iter()
                .map(|dep| format!("{namespace}:{dep}"))
                .collect();
            task.origin = Some(namespace.clone());
            out_tasks.insert(full_name, task);
        }

        chain.push(canonical);
        merge_includes(
            &dir,
            &raw.include,
            Some(&namespace),
            &inc_rel_dir,
            chain,
            seen,
            out_includes,
            out_tasks,
        )?;
        chain.pop();
    }

    Ok(())
}
