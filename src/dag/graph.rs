// src/dag/graph.rs

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::dag::spec::TaskSpec;
use crate::engine::TaskName;
use crate::errors::Result;

/// Internal node structure: the resolved task plus its direct dependents.
#[derive(Debug, Clone)]
struct DagNode {
    spec: Arc<TaskSpec>,
    /// Direct dependents: tasks that list this one in `depends_on`.
    dependents: Vec<TaskName>,
}

/// The full task graph of a (possibly composite) build, keyed by task name.
///
/// Acyclicity is validated in `config::validate`; this type only keeps
/// adjacency information for selection and planning.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskName, DagNode>,
}

impl TaskGraph {
    /// Build the graph from a validated [`ConfigFile`], resolving task
    /// directories against `root`.
    pub fn from_config(cfg: &ConfigFile, root: &Path) -> Result<Self> {
        let mut nodes: BTreeMap<TaskName, DagNode> = BTreeMap::new();

        for (name, task) in cfg.tasks().iter() {
            let spec = TaskSpec::from_config(name, cfg, task, root)?;
            nodes.insert(
                name.clone(),
                DagNode {
                    spec: Arc::new(spec),
                    dependents: Vec::new(),
                },
            );
        }

        let edges: Vec<(TaskName, TaskName)> = nodes
            .iter()
            .flat_map(|(name, node)| {
                node.spec
                    .deps
                    .iter()
                    .map(move |dep| (dep.clone(), name.clone()))
            })
            .collect();

        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(dependent);
            }
        }

        Ok(Self { nodes })
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn spec(&self, name: &str) -> Option<&Arc<TaskSpec>> {
        self.nodes.get(name).map(|n| &n.spec)
    }

    /// Immediate dependencies of a task (its `depends_on`).
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.spec.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in `depends_on`).
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}

/// Find a dependency cycle, if any.
///
/// `edges` maps each task to the tasks it depends on. The returned path
/// starts and ends with the same task and follows `depends_on` edges, e.g.
/// `["a", "b", "c", "a"]`. Among several cycles the one through the
/// alphabetically smallest task is reported, so messages are stable.
pub fn find_cycle(edges: &BTreeMap<&str, Vec<&str>>) -> Option<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (task, deps) in edges.iter() {
        graph.add_node(task);
        for dep in deps {
            graph.add_edge(task, dep, ());
        }
    }

    if toposort(&graph, None).is_ok() {
        return None;
    }

    let component = tarjan_scc(&graph)
        .into_iter()
        .filter(|c| c.len() > 1 || c.iter().any(|n| graph.contains_edge(n, n)))
        .min_by_key(|c| c.iter().min().copied())?;

    let members: HashSet<&str> = component.iter().copied().collect();
    let start = component.iter().min().copied()?;

    let mut path = vec![start];
    let mut visited = HashSet::new();
    visited.insert(start);
    if walk_back_to_start(&graph, &members, start, start, &mut path, &mut visited) {
        Some(path.into_iter().map(str::to_string).collect())
    } else {
        None
    }
}

fn walk_back_to_start<'a>(
    graph: &DiGraphMap<&'a str, ()>,
    members: &HashSet<&'a str>,
    start: &'a str,
    current: &'a str,
    path: &mut Vec<&'a str>,
    visited: &mut HashSet<&'a str>,
) -> bool {
    let mut next: Vec<&'a str> = graph
        .neighbors(current)
        .filter(|n| members.contains(n))
        .collect();
    next.sort_unstable();

    for n in next {
        if n == start {
            path.push(start);
            return true;
        }
        if visited.insert(n) {
            path.push(n);
            if walk_back_to_start(graph, members, start, n, path, visited) {
                return true;
            }
            path.pop();
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges<'a>(pairs: &[(&'a str, &[&'a str])]) -> BTreeMap<&'a str, Vec<&'a str>> {
        pairs.iter().map(|(t, d)| (*t, d.to_vec())).collect()
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let e = edges(&[("a", &[]), ("b", &["a"]), ("c", &["a", "b"])]);
        assert_eq!(find_cycle(&e), None);
    }

    #[test]
    fn reports_full_cycle_path() {
        let e = edges(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["a"]),
            ("d", &["a"]),
        ]);
        assert_eq!(
            find_cycle(&e),
            Some(vec!["a".into(), "b".into(), "c".into(), "a".into()])
        );
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let e = edges(&[("a", &["a"])]);
        assert_eq!(find_cycle(&e), Some(vec!["a".into(), "a".into()]));
    }
}
