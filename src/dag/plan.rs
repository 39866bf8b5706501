// src/dag/plan.rs

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::dag::spec::TaskSpec;
use crate::engine::TaskName;
use crate::errors::{DagbuildError, Result};

/// The selected tasks of one invocation, their edges, and a deterministic
/// topological order.
///
/// Dependencies on tasks outside the plan (excluded tasks) are dropped, so
/// every edge stored here connects two plan members.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    order: Vec<TaskName>,
    specs: HashMap<TaskName, Arc<TaskSpec>>,
    deps: HashMap<TaskName, Vec<TaskName>>,
    dependents: HashMap<TaskName, Vec<TaskName>>,
}

impl ExecutionPlan {
    /// Build a plan from the selected specs.
    ///
    /// Ordering uses Kahn's algorithm with a name-ordered ready set, so the
    /// same selection always yields the same order.
    pub fn new(selected: Vec<Arc<TaskSpec>>) -> Result<Self> {
        let specs: HashMap<TaskName, Arc<TaskSpec>> = selected
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();

        let mut deps: HashMap<TaskName, Vec<TaskName>> = HashMap::new();
        let mut dependents: HashMap<TaskName, Vec<TaskName>> = HashMap::new();

        for (name, spec) in specs.iter() {
            let mut in_plan: Vec<TaskName> = spec
                .deps
                .iter()
                .filter(|d| specs.contains_key(*d))
                .cloned()
                .collect();
            in_plan.sort();
            in_plan.dedup();

            for dep in in_plan.iter() {
                dependents.entry(dep.clone()).or_default().push(name.clone());
            }
            deps.insert(name.clone(), in_plan);
            dependents.entry(name.clone()).or_default();
        }
        for list in dependents.values_mut() {
            list.sort();
        }

        let mut remaining: HashMap<&str, usize> = deps
            .iter()
            .map(|(name, d)| (name.as_str(), d.len()))
            .collect();
        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(specs.len());
        while let Some(next) = ready.pop_first() {
            order.push(next.to_string());
            for dependent in dependents.get(next).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent.as_str());
                    }
                }
            }
        }

        if order.len() != specs.len() {
            let mut stuck: Vec<&str> = remaining
                .iter()
                .filter(|(_, n)| **n > 0)
                .map(|(name, _)| *name)
                .collect();
            stuck.sort_unstable();
            return Err(DagbuildError::DagCycle(format!(
                "cycle detected among tasks: {}",
                stuck.join(", ")
            )));
        }

        Ok(Self {
            order,
            specs,
            deps,
            dependents,
        })
    }

    /// Topological order: no task appears before any of its dependencies.
    pub fn order(&self) -> &[TaskName] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn spec(&self, name: &str) -> Option<&Arc<TaskSpec>> {
        self.specs.get(name)
    }

    /// Specs in plan order.
    pub fn specs(&self) -> impl Iterator<Item = &Arc<TaskSpec>> {
        self.order.iter().filter_map(|name| self.specs.get(name))
    }

    /// Dependencies of `name` that are part of the plan, sorted.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.deps.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dependents of `name` that are part of the plan, sorted.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Plan tasks without in-plan dependencies, in plan order.
    pub fn roots(&self) -> Vec<TaskName> {
        self.order
            .iter()
            .filter(|name| self.dependencies_of(name).is_empty())
            .cloned()
            .collect()
    }

    /// Tasks grouped by dependency depth. Level 0 holds the roots; a task
    /// sits one level above its deepest dependency.
    pub fn levels(&self) -> Vec<Vec<TaskName>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut levels: Vec<Vec<TaskName>> = Vec::new();

        for name in self.order.iter() {
            let d = self
                .dependencies_of(name)
                .iter()
                .filter_map(|dep| depth.get(dep.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(name.as_str(), d);
            if levels.len() <= d {
                levels.resize_with(d + 1, Vec::new);
            }
            levels[d].push(name.clone());
        }

        levels
    }
}
