// src/exec/executor_loop.rs

//! Main executor loop: receives scheduled tasks and runs them on the pool.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::pool::WorkerPool;
use crate::exec::task_runner::run_task;
use crate::incremental::IncrementalEngine;

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<ScheduledTask>` is what `RealExecutorBackend`
/// uses to hand over ready tasks. Each task runs on the pool, so no more than
/// `pool.size()` tasks execute at once.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    pool: WorkerPool,
    incremental: Arc<IncrementalEngine>,
    cancel_rx: watch::Receiver<bool>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(64);

    tokio::spawn(async move {
        info!(workers = pool.size(), "executor loop started");

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &pool, &incremental, &runtime_tx, &cancel_rx);
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Handle a newly scheduled task.
///
/// The task waits for a worker on the pool. A task whose worker frees up
/// after cancellation reports `Cancelled` from the runner without starting.
fn handle_scheduled_task(
    task: ScheduledTask,
    pool: &WorkerPool,
    incremental: &Arc<IncrementalEngine>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    cancel_rx: &watch::Receiver<bool>,
) {
    debug!(
        task = %task.name,
        run_id = task.run_id,
        free_workers = pool.available(),
        "task queued for a worker"
    );

    let name = task.name.clone();
    let run = run_task(task, Arc::clone(incremental), runtime_tx.clone(), cancel_rx.clone());
    pool.spawn(async move {
        run.await;
        debug!(task = %name, "task runner future finished");
    });
}
