// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::report::BuildReport;
use crate::engine::{BuildReason, RuntimeOptions, TaskName, TaskOutcome};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// A new build run started.
    RunStarted { run_id: u64 },
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Kill every running task (interrupt).
    CancelRunning,
    /// The current run reached a terminal state.
    RunFinished(BuildReport),
    /// Request that the runtime exits.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Mutable per-runtime flags shared by the handlers.
#[derive(Debug, Default)]
pub struct CoreFlags {
    /// A rebuild was requested while a run was active.
    pub rebuild_pending: bool,
    /// Shutdown was requested; no new run is started.
    pub shutting_down: bool,
}

/// Handle a build request.
///
/// - Idle: start a new run.
/// - Run active: remember one pending rebuild; any number of requests
///   during a run collapse into a single follow-up run.
pub fn handle_build_request(
    scheduler: &mut Scheduler,
    flags: &mut CoreFlags,
    options: &RuntimeOptions,
    reason: BuildReason,
) -> CoreStep {
    if flags.shutting_down {
        debug!(?reason, "build requested during shutdown; ignoring");
        return CoreStep::running(Vec::new());
    }

    if !scheduler.is_idle() {
        if !flags.rebuild_pending {
            info!(?reason, "build requested while running; queued one rebuild");
        }
        flags.rebuild_pending = true;
        return CoreStep::running(Vec::new());
    }

    info!(?reason, "starting build");
    start_run(scheduler, flags, options)
}

/// Handle a task completion event.
pub fn handle_task_finished(
    scheduler: &mut Scheduler,
    flags: &mut CoreFlags,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = scheduler.step_completion(&task, outcome);
    apply_scheduler_step(scheduler, flags, options, step)
}

/// Handle a shutdown request.
///
/// The first request skips pending tasks and cancels running ones; the
/// runtime then exits once the cancelled tasks have reported back. A second
/// request exits immediately.
pub fn handle_shutdown(
    scheduler: &mut Scheduler,
    flags: &mut CoreFlags,
    options: &RuntimeOptions,
) -> CoreStep {
    if flags.shutting_down || scheduler.is_idle() {
        flags.shutting_down = true;
        return CoreStep {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        };
    }

    warn!("shutdown requested; cancelling running tasks");
    flags.shutting_down = true;
    flags.rebuild_pending = false;

    let step = scheduler.cancel_pending();
    let mut result = apply_scheduler_step(scheduler, flags, options, step);
    if result.keep_running {
        result.commands.insert(0, CoreCommand::CancelRunning);
    }
    result
}

fn start_run(scheduler: &mut Scheduler, flags: &mut CoreFlags, options: &RuntimeOptions) -> CoreStep {
    let step = scheduler.step_start();
    let mut commands = Vec::new();
    if let Some(run_id) = scheduler.last_run_id() {
        commands.push(CoreCommand::RunStarted { run_id });
    }

    let mut rest = apply_scheduler_step(scheduler, flags, options, step);
    commands.append(&mut rest.commands);
    CoreStep {
        commands,
        keep_running: rest.keep_running,
    }
}

/// Turn a scheduler step into commands, finishing the run when it ended.
fn apply_scheduler_step(
    scheduler: &mut Scheduler,
    flags: &mut CoreFlags,
    options: &RuntimeOptions,
    step: SchedulerStep,
) -> CoreStep {
    let mut commands = Vec::new();

    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }
    if !step.newly_skipped.is_empty() {
        debug!(skipped = ?step.newly_skipped, "tasks skipped");
    }

    if !step.run_just_finished {
        return CoreStep::running(commands);
    }

    if let Some(report) = scheduler.report() {
        commands.push(CoreCommand::RunFinished(report));
    }

    if flags.shutting_down || !options.continuous {
        commands.push(CoreCommand::RequestExit);
        return CoreStep {
            commands,
            keep_running: false,
        };
    }

    if flags.rebuild_pending {
        flags.rebuild_pending = false;
        info!("starting queued rebuild");
        let mut next = start_run(scheduler, flags, options);
        commands.append(&mut next.commands);
        return CoreStep {
            commands,
            keep_running: next.keep_running,
        };
    }

    info!("build finished; waiting for changes");
    CoreStep::running(commands)
}
