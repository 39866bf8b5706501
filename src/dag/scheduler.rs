use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::plan::ExecutionPlan;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::report::BuildReport;
use crate::engine::{TaskName, TaskOutcome};
use crate::types::FailureMode;

/// Scheduler holds the immutable plan plus mutable per-run state.
///
/// It is responsible for:
/// - putting every plan task into a new run
/// - deciding when a pending task is "ready" to run (deps satisfied)
/// - recording outcomes and scheduling dependents when appropriate
/// - skipping tasks after a failure, according to the failure mode
#[derive(Debug)]
pub struct Scheduler {
    plan: ExecutionPlan,
    failure_mode: FailureMode,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
    /// Whether the current (or last) run was interrupted.
    interrupted: bool,
}

impl Scheduler {
    pub fn new(plan: ExecutionPlan, failure_mode: FailureMode) -> Self {
        let tasks = plan
            .specs()
            .map(|spec| {
                let deps = plan.dependencies_of(&spec.name).to_vec();
                (spec.name.clone(), TaskInfo::new(spec.clone(), deps))
            })
            .collect();

        Self {
            plan,
            failure_mode,
            tasks,
            run_counter: 0,
            current_run_id: None,
            interrupted: false,
        }
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Current run ID, if any.
    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// ID of the active run, or of the last finished one.
    pub fn last_run_id(&self) -> Option<u64> {
        (self.run_counter > 0).then_some(self.run_counter)
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Names of tasks that are participating in the *active* run, in plan
    /// order. Empty when idle.
    pub fn tasks_in_current_run(&self) -> Vec<TaskName> {
        if self.current_run_id.is_none() {
            return Vec::new();
        }

        self.plan
            .order()
            .iter()
            .filter(|name| {
                self.tasks
                    .get(name.as_str())
                    .is_some_and(|info| info.run_state.is_some())
            })
            .cloned()
            .collect()
    }

    /// Whether the dependencies of `task` are satisfied for the *current run*.
    ///
    /// Returns `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        let mgr = ReadOnlyStateManager::new(&self.tasks);
        Some(mgr.deps_satisfied_for_info(info))
    }

    /// Plan task names in plan order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.plan.order().iter().map(String::as_str)
    }

    /// Start a new run: every plan task becomes `Pending` and the tasks
    /// without unfinished dependencies are returned (now `Running`).
    pub fn start_new_run(&mut self) -> Vec<ScheduledTask> {
        self.step_start().newly_scheduled
    }

    /// Manual-step variant of `start_new_run`.
    ///
    /// An empty plan finishes immediately (`run_just_finished`).
    pub fn step_start(&mut self) -> SchedulerStep {
        if let Some(run_id) = self.current_run_id {
            warn!(run_id, "start_new_run called while a run is active; ignoring");
            return SchedulerStep::default();
        }

        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        self.interrupted = false;

        debug!(run_id = self.run_counter, tasks = self.plan.len(), "scheduler: starting new build run");

        let mut manager = StateManager::new(&self.plan, &mut self.tasks, self.current_run_id);
        manager.mark_all_pending();
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_skipped: Vec::new(),
            run_just_finished,
        }
    }

    /// Handle completion of a task with a concrete outcome (production API).
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.completion_step_internal(task, outcome)
            .newly_scheduled
    }

    /// Manual-step variant of `handle_completion` that returns a rich [`SchedulerStep`].
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, outcome)
    }

    /// Interrupt the active run: every `Pending` task becomes `Skipped`.
    /// Running tasks keep running until their completion arrives.
    pub fn cancel_pending(&mut self) -> SchedulerStep {
        if self.current_run_id.is_none() {
            return SchedulerStep::default();
        }

        self.interrupted = true;
        let mut manager = StateManager::new(&self.plan, &mut self.tasks, self.current_run_id);
        let newly_skipped = manager.skip_all_pending();
        info!(
            run_id = self.current_run_id,
            skipped = newly_skipped.len(),
            "run interrupted; pending tasks skipped"
        );
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_skipped,
            run_just_finished,
        }
    }

    /// Report of the active run, or of the last finished one. `None` before
    /// the first run.
    pub fn report(&self) -> Option<BuildReport> {
        if self.run_counter == 0 {
            return None;
        }

        let entries = self
            .plan
            .order()
            .iter()
            .map(|name| {
                let state = self
                    .tasks
                    .get(name)
                    .map(|info| TaskRunState::from(info.run_state))
                    .unwrap_or(TaskRunState::NotInRun);
                (name.clone(), state)
            })
            .collect();

        Some(BuildReport::new(self.run_counter, entries, self.interrupted))
    }

    /// Determine whether all tasks are in a terminal state and clear
    /// `current_run_id` if so.
    ///
    /// Returns `true` if this call transitioned the scheduler from running
    /// to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.plan, &mut self.tasks, self.current_run_id);

        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }

    /// Internal implementation of `handle_completion` / `step_completion`.
    fn completion_step_internal(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                warn!(
                    task = %task,
                    "handle_completion called with no active run; ignoring"
                );
                return SchedulerStep::default();
            }
        };

        let mut newly_scheduled = Vec::new();
        let mut newly_skipped = Vec::new();

        match self.tasks.get_mut(task) {
            Some(info) if info.run_state != Some(RunState::Running) => {
                warn!(
                    task = %task,
                    state = ?TaskRunState::from(info.run_state),
                    "completion for task that is not running; ignoring"
                );
            }
            Some(info) => {
                info.run_state = Some(RunState::Done(outcome));

                if outcome.is_success() {
                    info.last_successful_run = Some(run_id);
                    debug!(task = %info.name, run_id, ?outcome, "task completed successfully");
                    let mut manager =
                        StateManager::new(&self.plan, &mut self.tasks, self.current_run_id);
                    newly_scheduled.extend(manager.collect_new_ready_tasks());
                } else {
                    info.last_failed_run = Some(run_id);
                    warn!(
                        task = %info.name,
                        run_id,
                        ?outcome,
                        failure_mode = ?self.failure_mode,
                        "task did not succeed"
                    );
                    let mut manager =
                        StateManager::new(&self.plan, &mut self.tasks, self.current_run_id);
                    newly_skipped = match self.failure_mode {
                        FailureMode::FailFast => manager.skip_all_pending(),
                        FailureMode::FailAtEnd => manager.mark_dependents_skipped(task),
                    };
                }
            }
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
            }
        }

        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_skipped,
            run_just_finished,
        }
    }
}
