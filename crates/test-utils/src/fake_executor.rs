use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use dagbuild::dag::ScheduledTask;
use dagbuild::engine::{RuntimeEvent, TaskOutcome};
use dagbuild::errors::Result;
use dagbuild::exec::ExecutorBackend;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which tasks were dispatched, in order
/// - immediately reports `TaskFinished` with the configured outcome
///   (`Executed` unless overridden)
/// - keeps "held" tasks running until `cancel_running`, which then reports
///   them as `Cancelled`.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    outcomes: HashMap<String, TaskOutcome>,
    held: HashSet<String>,
    running: Vec<String>,
    cancel_calls: Arc<Mutex<usize>>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            outcomes: HashMap::new(),
            held: HashSet::new(),
            running: Vec::new(),
            cancel_calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Report `outcome` whenever `task` is dispatched.
    pub fn with_outcome(mut self, task: &str, outcome: TaskOutcome) -> Self {
        self.outcomes.insert(task.to_string(), outcome);
        self
    }

    /// Never finish `task` on its own; it only ends through cancellation.
    pub fn hold(mut self, task: &str) -> Self {
        self.held.insert(task.to_string());
        self
    }

    /// Shared counter of `cancel_running` calls.
    pub fn cancel_calls(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.cancel_calls)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        let mut finished = Vec::new();
        for t in tasks {
            executed.lock().unwrap().push(t.name.clone());
            if self.held.contains(&t.name) {
                self.running.push(t.name.clone());
            } else {
                let outcome = self
                    .outcomes
                    .get(&t.name)
                    .copied()
                    .unwrap_or(TaskOutcome::Executed);
                finished.push((t.name.clone(), outcome));
            }
        }

        Box::pin(async move {
            for (task, outcome) in finished {
                tx.send(RuntimeEvent::TaskFinished { task, outcome })
                    .await
                    .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel_running(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        *self.cancel_calls.lock().unwrap() += 1;
        let tx = self.runtime_tx.clone();
        let running = std::mem::take(&mut self.running);

        Box::pin(async move {
            for task in running {
                tx.send(RuntimeEvent::TaskFinished {
                    task,
                    outcome: TaskOutcome::Cancelled,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
