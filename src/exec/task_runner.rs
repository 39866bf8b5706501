// src/exec/task_runner.rs

//! Individual task runner: up-to-date check, cache, process, bookkeeping.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::dag::spec::TaskSpec;
use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::incremental::{IncrementalEngine, Preparation};

/// Run one scheduled task to completion and report it.
///
/// Every path ends in exactly one `TaskFinished` event. Internal errors
/// (hashing, spawning, joining) are reported as `Failed(-1)`.
pub async fn run_task(
    task: ScheduledTask,
    incremental: Arc<IncrementalEngine>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: watch::Receiver<bool>,
) {
    // Cancelled while waiting for a worker: nothing ran, so history stays.
    let cancelled_before_start = *cancel_rx.borrow();
    if cancelled_before_start {
        debug!(task = %task.name, "cancelled before it started");
        send_finished(&runtime_tx, &task.name, TaskOutcome::Cancelled).await;
        return;
    }

    let outcome = match run_task_inner(&task, &incremental, cancel_rx).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                task = %task.name,
                run_id = task.run_id,
                error = ?err,
                "task execution error"
            );
            TaskOutcome::Failed(-1)
        }
    };

    if !outcome.is_success() {
        let engine = Arc::clone(&incremental);
        let spec = Arc::clone(&task.spec);
        let forgotten = tokio::task::spawn_blocking(move || engine.record_failure(&spec)).await;
        match forgotten {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(task = %task.name, error = %err, "failed to clear execution history"),
            Err(err) => warn!(task = %task.name, error = %err, "history cleanup panicked"),
        }
    }

    send_finished(&runtime_tx, &task.name, outcome).await;
}

async fn send_finished(runtime_tx: &mpsc::Sender<RuntimeEvent>, task: &str, outcome: TaskOutcome) {
    let event = RuntimeEvent::TaskFinished {
        task: task.to_string(),
        outcome,
    };
    if runtime_tx.send(event).await.is_err() {
        debug!(task, "runtime gone; dropping TaskFinished event");
    }
}

async fn run_task_inner(
    task: &ScheduledTask,
    incremental: &Arc<IncrementalEngine>,
    mut cancel_rx: watch::Receiver<bool>,
) -> Result<TaskOutcome> {
    let preparation = {
        let engine = Arc::clone(incremental);
        let spec = Arc::clone(&task.spec);
        tokio::task::spawn_blocking(move || engine.prepare(&spec))
            .await
            .context("joining up-to-date check")??
    };

    let (inputs, reason) = match preparation {
        Preparation::UpToDate => return Ok(TaskOutcome::UpToDate),
        Preparation::FromCache { .. } => return Ok(TaskOutcome::FromCache),
        Preparation::Execute { inputs, reason } => (inputs, reason),
    };

    info!(
        task = %task.name,
        run_id = task.run_id,
        %reason,
        cmd = %task.spec.cmd,
        "executing task"
    );

    let outcome = run_process(&task.spec, task.run_id, &mut cancel_rx).await?;

    if outcome == TaskOutcome::Executed {
        let engine = Arc::clone(incremental);
        let spec = Arc::clone(&task.spec);
        let recorded = tokio::task::spawn_blocking(move || engine.record_success(&spec, &inputs))
            .await
            .context("joining history update")?;
        if let Err(err) = recorded {
            warn!(
                task = %task.name,
                error = ?err,
                "task succeeded but its execution history could not be recorded"
            );
        }
    }

    Ok(outcome)
}

/// Spawn the task's command through the platform shell and wait for it,
/// its timeout, or cancellation.
async fn run_process(
    spec: &TaskSpec,
    run_id: u64,
    cancel_rx: &mut watch::Receiver<bool>,
) -> Result<TaskOutcome> {
    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&spec.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&spec.cmd);
        c
    };

    cmd.current_dir(&spec.dir)
        .envs(spec.env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}' in {:?}", spec.name, spec.dir))?;

    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, spec.name.clone(), run_id, "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, spec.name.clone(), run_id, "stderr");
    }

    let timeout = spec.timeout;
    let deadline = async move {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of task '{}'", spec.name)
            })?;
            let code = status.code().unwrap_or(-1);

            info!(
                task = %spec.name,
                run_id,
                exit_code = code,
                success = status.success(),
                "task process exited"
            );

            Ok(if status.success() {
                TaskOutcome::Executed
            } else {
                TaskOutcome::Failed(code)
            })
        }

        _ = deadline => {
            warn!(
                task = %spec.name,
                run_id,
                timeout = ?timeout,
                "task timed out; killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(task = %spec.name, error = %e, "failed to kill timed-out process");
            }
            Ok(TaskOutcome::Failed(-1))
        }

        _ = cancelled(cancel_rx) => {
            info!(
                task = %spec.name,
                run_id,
                "cancellation requested for running task; killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(task = %spec.name, error = %e, "failed to kill child process on cancellation");
            }
            Ok(TaskOutcome::Cancelled)
        }
    }
}

/// Resolves once the cancel flag is set. Never resolves if the sender is
/// gone without cancelling.
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    let sender_gone = cancel_rx.wait_for(|c| *c).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

/// Log every line of a child stream with the task name attached.
fn forward_lines<R>(stream: R, task: String, run_id: u64, label: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(task = %task, run_id, stream = label, "{}", line);
        }
    });
}
