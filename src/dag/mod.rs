// src/dag/mod.rs

//! Task graph, selection, planning and scheduling.
//!
//! - [`graph`] holds the full task graph of a (composite) build.
//! - [`selection`] resolves requested task names and computes the plan.
//! - [`plan`] is the selected sub-graph with a deterministic order.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run, and what a failure skips.
//! - [`task_info`] provides task metadata and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod plan;
pub mod scheduler;
pub mod scheduler_step;
pub mod selection;
pub mod spec;
pub mod state_manager;
pub mod task_info;

pub use graph::TaskGraph;
pub use plan::ExecutionPlan;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use selection::{resolve_task_name, select};
pub use spec::TaskSpec;
pub use task_info::{ScheduledTask, SuccessKind, TaskRunState};
