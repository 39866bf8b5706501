#![allow(dead_code)]

pub use dagbuild_test_utils::builders;
pub use dagbuild_test_utils::init_tracing;

use std::path::Path;
use std::sync::Arc;

use dagbuild::config::ConfigFile;
use dagbuild::dag::{select, ExecutionPlan, TaskGraph, TaskSpec};

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Plan of every task in `cfg`, rooted at `/proj`.
pub fn full_plan(cfg: &ConfigFile) -> ExecutionPlan {
    plan_for(cfg, &[])
}

/// Plan for the requested task names, rooted at `/proj`.
pub fn plan_for(cfg: &ConfigFile, requested: &[&str]) -> ExecutionPlan {
    let graph = TaskGraph::from_config(cfg, Path::new("/proj")).expect("graph");
    let requested: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
    select(&graph, &requested, &[], &[]).expect("selection")
}

/// Spec of `task` resolved against `root`.
pub fn spec_of(cfg: &ConfigFile, task: &str, root: &Path) -> Arc<TaskSpec> {
    let graph = TaskGraph::from_config(cfg, root).expect("graph");
    graph.spec(task).cloned().expect("task exists")
}
