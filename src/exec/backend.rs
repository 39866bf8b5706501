// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor implementation in [`executor_loop`](super::executor_loop).
//!
//! - `RealExecutorBackend` is the implementation used by `dagbuild`. It
//!   wraps the `spawn_executor` loop, forwards scheduled tasks over an mpsc
//!   channel and broadcasts cancellation over a `watch` channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were scheduled and directly emits `TaskFinished` events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};
use crate::exec::executor_loop::spawn_executor;
use crate::exec::pool::WorkerPool;
use crate::incremental::IncrementalEngine;

/// Trait abstracting how scheduled tasks are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution.
    ///
    /// Every dispatched task must eventually produce exactly one
    /// `RuntimeEvent::TaskFinished`.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Kill running tasks and drop queued ones; each reports `Cancelled`.
    fn cancel_running(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ScheduledTask>,
    cancel_tx: watch::Sender<bool>,
}

impl RealExecutorBackend {
    /// Create a new real executor backend, wiring it to the given runtime
    /// event sender.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        pool: WorkerPool,
        incremental: Arc<IncrementalEngine>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let tx = spawn_executor(runtime_tx, pool, incremental, cancel_rx);
        Self { tx, cancel_tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(task).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel_running(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let already = self.cancel_tx.send_replace(true);
        Box::pin(async move {
            debug!(already_cancelled = already, "cancellation broadcast to running tasks");
            Ok(())
        })
    }
}
