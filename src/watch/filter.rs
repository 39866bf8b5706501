// src/watch/filter.rs

//! Decide whether a changed path should trigger a rebuild.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::dag::plan::ExecutionPlan;
use crate::incremental::fingerprint::{input_matcher, output_matcher};
use crate::incremental::patterns::PathMatcher;
use crate::watch::path_utils::relative_str;

#[derive(Debug, Clone)]
struct WatchedTask {
    dir: PathBuf,
    inputs: PathMatcher,
    outputs: PathMatcher,
}

/// Input and output patterns of every task in a plan.
///
/// A path is relevant when it is an input of some task, is not an output of
/// any task and is not inside the state directory. Outputs are ignored so
/// that a build never re-triggers itself.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    tasks: Vec<WatchedTask>,
    state_dir: PathBuf,
}

impl WatchFilter {
    pub fn from_plan(plan: &ExecutionPlan, state_dir: &Path) -> Result<Self> {
        let tasks = plan
            .specs()
            .map(|spec| {
                Ok(WatchedTask {
                    dir: spec.dir.clone(),
                    inputs: input_matcher(spec, state_dir)?,
                    outputs: output_matcher(spec, state_dir)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tasks,
            state_dir: state_dir.to_path_buf(),
        })
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        if relative_str(&self.state_dir, path).is_some() {
            return false;
        }
        if path.components().any(|c| c.as_os_str() == ".git") {
            return false;
        }

        let mut is_input = false;
        for task in self.tasks.iter() {
            let Some(rel) = relative_str(&task.dir, path) else {
                continue;
            };
            if task.outputs.matches(&rel) {
                return false;
            }
            is_input = is_input || task.inputs.matches(&rel);
        }
        is_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::spec::TaskSpec;
    use std::sync::Arc;

    fn spec(name: &str, dir: &str, inputs: &[&str], outputs: &[&str]) -> Arc<TaskSpec> {
        Arc::new(TaskSpec {
            name: name.into(),
            cmd: "true".into(),
            description: None,
            dir: PathBuf::from(dir),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            properties: Default::default(),
            env: Default::default(),
            cacheable: false,
            timeout: None,
            deps: Vec::new(),
        })
    }

    #[test]
    fn inputs_trigger_outputs_and_state_do_not() {
        let plan = ExecutionPlan::new(vec![
            spec("compile", "/proj", &["src/**"], &["build/**"]),
            spec("package", "/proj", &["build/**", "assets/**"], &["dist/**"]),
        ])
        .unwrap();
        let filter = WatchFilter::from_plan(&plan, Path::new("/proj/.dagbuild")).unwrap();

        assert!(filter.is_relevant(Path::new("/proj/src/main.c")));
        assert!(filter.is_relevant(Path::new("/proj/assets/logo.png")));
        assert!(!filter.is_relevant(Path::new("/proj/build/main.o")));
        assert!(!filter.is_relevant(Path::new("/proj/.dagbuild/history")));
        assert!(!filter.is_relevant(Path::new("/proj/README.md")));
    }
}
