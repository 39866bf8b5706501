// src/dag/selection.rs

//! Turn command-line task names into an [`ExecutionPlan`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::NAMESPACE_SEPARATOR;
use crate::dag::graph::TaskGraph;
use crate::dag::plan::ExecutionPlan;
use crate::dag::spec::TaskSpec;
use crate::engine::TaskName;
use crate::errors::{DagbuildError, Result};

/// Resolve a requested task name against the graph.
///
/// An exact match wins. Otherwise every `:`-separated segment of
/// `requested` must be a prefix of the corresponding segment of exactly one
/// task name (`num:ja` matches `numbers:jar`).
pub fn resolve_task_name(requested: &str, graph: &TaskGraph) -> Result<TaskName> {
    if graph.contains(requested) {
        return Ok(requested.to_string());
    }

    let wanted: Vec<&str> = requested.split(NAMESPACE_SEPARATOR).collect();
    let candidates: Vec<String> = graph
        .tasks()
        .filter(|name| segments_match(&wanted, name))
        .map(str::to_string)
        .collect();

    match candidates.len() {
        0 => Err(DagbuildError::TaskNotFound(requested.to_string())),
        1 => {
            debug!(requested, resolved = %candidates[0], "resolved abbreviated task name");
            Ok(candidates[0].clone())
        }
        _ => Err(DagbuildError::AmbiguousTask {
            name: requested.to_string(),
            candidates,
        }),
    }
}

fn segments_match(wanted: &[&str], candidate: &str) -> bool {
    let segments: Vec<&str> = candidate.split(NAMESPACE_SEPARATOR).collect();
    segments.len() == wanted.len()
        && wanted
            .iter()
            .zip(segments.iter())
            .all(|(w, s)| !w.is_empty() && s.starts_with(w))
}

/// Select the tasks needed to build `requested`, minus `excluded`.
///
/// - An empty `requested` falls back to `default_tasks`, then to every task.
/// - The selection is the transitive dependency closure. Traversal stops at
///   excluded tasks, which their dependents treat as satisfied.
pub fn select(
    graph: &TaskGraph,
    requested: &[String],
    excluded: &[String],
    default_tasks: &[String],
) -> Result<ExecutionPlan> {
    let excluded: BTreeSet<TaskName> = excluded
        .iter()
        .map(|name| resolve_task_name(name, graph))
        .collect::<Result<_>>()?;

    let roots: Vec<TaskName> = if !requested.is_empty() {
        requested
            .iter()
            .map(|name| resolve_task_name(name, graph))
            .collect::<Result<_>>()?
    } else if !default_tasks.is_empty() {
        default_tasks
            .iter()
            .map(|name| resolve_task_name(name, graph))
            .collect::<Result<_>>()?
    } else {
        graph.tasks().map(str::to_string).collect()
    };

    let mut selected: BTreeSet<TaskName> = BTreeSet::new();
    let mut stack: Vec<TaskName> = roots;

    while let Some(name) = stack.pop() {
        if excluded.contains(&name) || !selected.insert(name.clone()) {
            continue;
        }
        stack.extend(graph.dependencies_of(&name).iter().cloned());
    }

    debug!(
        selected = selected.len(),
        excluded = excluded.len(),
        "task selection complete"
    );

    let specs: Vec<Arc<TaskSpec>> = selected
        .iter()
        .filter_map(|name| graph.spec(name).cloned())
        .collect();

    ExecutionPlan::new(specs)
}
