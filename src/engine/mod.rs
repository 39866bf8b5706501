// src/engine/mod.rs

//! Orchestration engine for dagbuild.
//!
//! This module ties together:
//! - the plan scheduler
//! - rebuild coalescing (what happens when a rebuild is requested while a
//!   run is active)
//! - the main runtime event loop that reacts to:
//!   - build requests (initial build, file changes in continuous mode)
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// How a dispatched task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The action ran and exited successfully.
    Executed,
    /// Inputs and outputs matched the last successful execution.
    UpToDate,
    /// Outputs were restored from the build cache.
    FromCache,
    /// The action failed; exit code, or `-1` without one.
    Failed(i32),
    /// The action was killed because the build was interrupted.
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TaskOutcome::Executed | TaskOutcome::UpToDate | TaskOutcome::FromCache
        )
    }
}

/// Why a build run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildReason {
    /// The build started by the invocation itself.
    Initial,
    /// An input file changed (continuous mode).
    FileChange,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Keep running after a build finishes and wait for rebuild requests
    /// (`--continuous`). Otherwise the runtime exits after the first run.
    pub continuous: bool,
}

/// Events flowing into the runtime from the CLI, watcher and executor.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Run the plan (again).
    BuildRequested { reason: BuildReason },
    /// A dispatched task ended.
    TaskFinished {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod report;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use report::BuildReport;
pub use runtime::Runtime;
