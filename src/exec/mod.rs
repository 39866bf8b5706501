// src/exec/mod.rs

//! Task execution layer.
//!
//! This module is responsible for actually running the tasks of a plan,
//! using `tokio::process::Command`, and reporting back to the orchestration
//! runtime via `RuntimeEvent`s.
//!
//! - [`pool`] bounds how many tasks run at once.
//! - [`executor_loop`] owns the loop that hands scheduled tasks to workers.
//! - [`task_runner`] runs one task: up-to-date check, cache, process.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.
//! - [`duration`] parses timeout strings.

pub mod backend;
pub mod duration;
pub mod executor_loop;
pub mod pool;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
pub use pool::WorkerPool;
