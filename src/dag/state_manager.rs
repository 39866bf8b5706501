// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::plan::ExecutionPlan;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::engine::TaskName;

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    plan: &'a ExecutionPlan,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        plan: &'a ExecutionPlan,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            plan,
            tasks,
            current_run_id,
        }
    }

    /// Put every plan task into the run as `Pending`.
    pub fn mark_all_pending(&mut self) {
        for info in self.tasks.values_mut() {
            info.run_state = Some(RunState::Pending);
        }
    }

    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        let ro = ReadOnlyStateManager::new(self.tasks);
        ro.deps_satisfied_for_info(info)
    }

    /// Mark the pending transitive dependents of a failed task `Skipped`.
    ///
    /// Returns the newly skipped tasks (excluding the failed task itself).
    pub fn mark_dependents_skipped(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.plan.dependents_of(failed_task).to_vec();
        let mut visited: HashSet<TaskName> = HashSet::new();
        let mut newly_skipped = Vec::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(info) = self.tasks.get_mut(&name) {
                if matches!(info.run_state, Some(RunState::Pending)) {
                    info.run_state = Some(RunState::Skipped);
                    debug!(
                        task = %info.name,
                        upstream = %failed_task,
                        "skipping dependent of failed task"
                    );
                    newly_skipped.push(info.name.clone());
                }
                stack.extend(self.plan.dependents_of(&name).iter().cloned());
            } else {
                warn!(task = %name, "plan task not present in tasks map");
            }
        }

        newly_skipped
    }

    /// Mark every `Pending` task `Skipped`, in plan order.
    pub fn skip_all_pending(&mut self) -> Vec<TaskName> {
        let mut newly_skipped = Vec::new();
        for name in self.plan.order() {
            if let Some(info) = self.tasks.get_mut(name) {
                if matches!(info.run_state, Some(RunState::Pending)) {
                    info.run_state = Some(RunState::Skipped);
                    newly_skipped.push(name.clone());
                }
            }
        }
        newly_skipped
    }

    /// Collect tasks that are `Pending` and whose dependencies are satisfied,
    /// mark them as `Running`, and return them as `ScheduledTask`s in plan
    /// order.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let candidates: Vec<TaskName> = self
            .plan
            .order()
            .iter()
            .filter(|name| {
                self.tasks.get(name.as_str()).is_some_and(|info| {
                    matches!(info.run_state, Some(RunState::Pending))
                        && self.deps_satisfied_for_info(info)
                })
            })
            .cloned()
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                if info.last_successful_run.is_some() || info.last_failed_run.is_some() {
                    info!(
                        task = %info.name,
                        run_id = self.current_run_id,
                        "scheduling task that ran in an earlier run"
                    );
                } else {
                    debug!(
                        task = %info.name,
                        run_id = self.current_run_id,
                        "dependencies satisfied; marking Running"
                    );
                }

                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(
                    info,
                    self.current_run_id.unwrap_or(0),
                ));
            }
        }

        ready
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        })
    }
}

/// A read-only view of the state manager for checking dependency satisfaction.
///
/// This is used when we only have shared access to the tasks map (e.g. in `Scheduler::deps_satisfied`).
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// A dependency is satisfied once it finished successfully in this run
    /// (executed, up-to-date or restored from cache).
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| match self.tasks.get(dep_name) {
            Some(dep) => matches!(
                dep.run_state,
                Some(RunState::Done(outcome)) if outcome.is_success()
            ),
            None => {
                warn!(
                    task = %info.name,
                    dep = %dep_name,
                    "dependency missing from tasks map"
                );
                false
            }
        })
    }
}
