// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledTask`s to the executor
//! - cancelling running tasks and timing runs
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_build_request, handle_shutdown, handle_task_finished, CoreFlags, CoreStep,
};
use crate::engine::report::BuildReport;
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// This owns:
/// - the plan scheduler
/// - the pending-rebuild and shutdown flags
/// - runtime options (e.g. `continuous`)
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    flags: CoreFlags,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            flags: CoreFlags::default(),
            options,
        }
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Whether a rebuild is queued behind the active run (for tests).
    pub fn rebuild_pending(&self) -> bool {
        self.flags.rebuild_pending
    }

    /// Report of the active or last run.
    pub fn report(&self) -> Option<BuildReport> {
        self.scheduler.report()
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::BuildRequested { reason } => {
                handle_build_request(&mut self.scheduler, &mut self.flags, &self.options, reason)
            }
            RuntimeEvent::TaskFinished { task, outcome } => handle_task_finished(
                &mut self.scheduler,
                &mut self.flags,
                &self.options,
                task,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => {
                handle_shutdown(&mut self.scheduler, &mut self.flags, &self.options)
            }
        }
    }
}
