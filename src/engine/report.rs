// src/engine/report.rs

use std::fmt;
use std::time::Duration;

use crate::dag::task_info::{SuccessKind, TaskRunState};
use crate::engine::TaskName;

/// Per-task result of one build run, in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    run_id: u64,
    entries: Vec<(TaskName, TaskRunState)>,
    interrupted: bool,
    elapsed: Duration,
}

/// Outcome counts of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportCounts {
    pub executed: usize,
    pub up_to_date: usize,
    pub from_cache: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
}

impl BuildReport {
    pub fn new(run_id: u64, entries: Vec<(TaskName, TaskRunState)>, interrupted: bool) -> Self {
        Self {
            run_id,
            entries,
            interrupted,
            elapsed: Duration::ZERO,
        }
    }

    /// Attach the wall-clock duration measured by the runtime shell.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn entries(&self) -> &[(TaskName, TaskRunState)] {
        &self.entries
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn state_of(&self, task: &str) -> Option<TaskRunState> {
        self.entries
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, state)| *state)
    }

    /// True when every task succeeded (vacuously true for an empty plan).
    pub fn is_success(&self) -> bool {
        !self.interrupted && self.entries.iter().all(|(_, s)| s.is_success())
    }

    /// Tasks that failed or were cancelled.
    pub fn failed_tasks(&self) -> Vec<TaskName> {
        self.entries
            .iter()
            .filter(|(_, s)| matches!(s, TaskRunState::Failed(_) | TaskRunState::Cancelled))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn counts(&self) -> ReportCounts {
        let mut c = ReportCounts::default();
        for (_, state) in self.entries.iter() {
            match state {
                TaskRunState::Succeeded(SuccessKind::Executed) => c.executed += 1,
                TaskRunState::Succeeded(SuccessKind::UpToDate) => c.up_to_date += 1,
                TaskRunState::Succeeded(SuccessKind::FromCache) => c.from_cache += 1,
                TaskRunState::Failed(_) => c.failed += 1,
                TaskRunState::Cancelled => c.cancelled += 1,
                TaskRunState::Skipped => c.skipped += 1,
                TaskRunState::NotInRun | TaskRunState::Pending | TaskRunState::Running => {}
            }
        }
        c
    }
}

fn label(state: &TaskRunState) -> String {
    match state {
        TaskRunState::Succeeded(SuccessKind::Executed) => "EXECUTED".to_string(),
        TaskRunState::Succeeded(SuccessKind::UpToDate) => "UP-TO-DATE".to_string(),
        TaskRunState::Succeeded(SuccessKind::FromCache) => "FROM-CACHE".to_string(),
        TaskRunState::Failed(-1) => "FAILED".to_string(),
        TaskRunState::Failed(code) => format!("FAILED (exit code {code})"),
        TaskRunState::Cancelled => "CANCELLED".to_string(),
        TaskRunState::Skipped => "SKIPPED".to_string(),
        TaskRunState::NotInRun | TaskRunState::Pending | TaskRunState::Running => {
            "NOT RUN".to_string()
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .entries
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);

        for (name, state) in self.entries.iter() {
            writeln!(f, "  {:<width$}  {}", name, label(state), width = width)?;
        }

        let c = self.counts();
        let actionable = c.executed + c.up_to_date + c.from_cache + c.failed + c.cancelled;
        writeln!(
            f,
            "{} actionable task(s): {} executed, {} from cache, {} up-to-date",
            actionable, c.executed, c.from_cache, c.up_to_date
        )?;

        let verdict = if self.interrupted {
            "BUILD INTERRUPTED"
        } else if self.is_success() {
            "BUILD SUCCESSFUL"
        } else {
            "BUILD FAILED"
        };
        write!(f, "{} in {:.1}s", verdict, self.elapsed.as_secs_f64())
    }
}
