// src/engine/runtime.rs

use std::fmt;
use std::time::Instant;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::errors::{DagbuildError, Result};
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::report::BuildReport;
use super::{CoreCommand, RuntimeEvent};

/// Drives the plan scheduler in response to `RuntimeEvent`s,
/// and delegates actual task execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, dispatching tasks to the executor and timing runs.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    run_started: Option<Instant>,
    last_report: Option<BuildReport>,
    report_hook: Option<ReportHook>,
}

/// Callback invoked with every finished run's report.
pub type ReportHook = Box<dyn FnMut(&BuildReport) + Send>;

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            run_started: None,
            last_report: None,
            report_hook: None,
        }
    }

    /// Call `hook` with the report of every finished run (continuous mode
    /// prints each one).
    pub fn with_report_hook(mut self, hook: ReportHook) -> Self {
        self.report_hook = Some(hook);
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (dispatch, cancel, exit).
    ///
    /// Returns the report of the last finished run.
    pub async fn run(mut self) -> Result<BuildReport> {
        info!("dagbuild runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                debug!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        self.last_report
            .ok_or_else(|| DagbuildError::Other(anyhow!("runtime stopped before any build finished")))
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::RunStarted { run_id } => {
                debug!(run_id, "build run started");
                self.run_started = Some(Instant::now());
            }
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::CancelRunning => {
                self.executor.cancel_running().await?;
            }
            CoreCommand::RunFinished(report) => {
                let elapsed = self
                    .run_started
                    .take()
                    .map(|t| t.elapsed())
                    .unwrap_or_default();
                let report = report.with_elapsed(elapsed);
                info!(
                    run_id = report.run_id(),
                    success = report.is_success(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "build run finished"
                );
                if let Some(hook) = self.report_hook.as_mut() {
                    hook(&report);
                }
                self.last_report = Some(report);
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        let run_ids: Vec<_> = tasks.iter().map(|t| t.run_id).collect();
        debug!(?names, ?run_ids, "dispatching ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
