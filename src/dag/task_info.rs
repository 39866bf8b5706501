// src/dag/task_info.rs

//! Task metadata and per-run state management.

use std::sync::Arc;

use crate::dag::spec::TaskSpec;
use crate::engine::{TaskName, TaskOutcome};

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of this run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    /// Finished with a concrete outcome (success or failure).
    Done(TaskOutcome),
    /// Never started: an upstream task failed, fail-fast kicked in, or the
    /// run was interrupted.
    Skipped,
}

/// How a task ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessKind {
    Executed,
    UpToDate,
    FromCache,
}

/// Public, read-only view of a task's per-run state.
///
/// This is exposed for tests, diagnostics and the build report without
/// leaking the internal `RunState` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not participating in a run.
    NotInRun,
    Pending,
    Running,
    Succeeded(SuccessKind),
    /// Exit code of the failed action; `-1` when there was none (spawn
    /// error, timeout, internal error).
    Failed(i32),
    Cancelled,
    Skipped,
}

impl TaskRunState {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskRunState::Succeeded(_))
    }

    /// Pending and Running are the only non-terminal states.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TaskRunState::NotInRun | TaskRunState::Pending | TaskRunState::Running
        )
    }
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Skipped) => TaskRunState::Skipped,
            Some(RunState::Done(outcome)) => match outcome {
                TaskOutcome::Executed => TaskRunState::Succeeded(SuccessKind::Executed),
                TaskOutcome::UpToDate => TaskRunState::Succeeded(SuccessKind::UpToDate),
                TaskOutcome::FromCache => TaskRunState::Succeeded(SuccessKind::FromCache),
                TaskOutcome::Failed(code) => TaskRunState::Failed(code),
                TaskOutcome::Cancelled => TaskRunState::Cancelled,
            },
        }
    }
}

/// Plan task plus its per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    pub spec: Arc<TaskSpec>,
    /// Dependencies that are part of the plan. Excluded tasks are not
    /// listed and therefore never block.
    pub deps: Vec<TaskName>,

    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,

    /// Last run ID in which this task succeeded.
    pub last_successful_run: Option<u64>,

    /// Last run ID in which this task failed.
    pub last_failed_run: Option<u64>,
}

impl TaskInfo {
    pub fn new(spec: Arc<TaskSpec>, deps: Vec<TaskName>) -> Self {
        Self {
            name: spec.name.clone(),
            spec,
            deps,
            run_state: None,
            last_successful_run: None,
            last_failed_run: None,
        }
    }
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub spec: Arc<TaskSpec>,
    /// Monotonically increasing build run identifier.
    ///
    /// All tasks that belong to the same run share the same `run_id`.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            spec: Arc::clone(&info.spec),
            run_id,
        }
    }
}
