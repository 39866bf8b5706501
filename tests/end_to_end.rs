// tests/end_to_end.rs
//
// Full invocations through `dagbuild::run` with real shell commands.

#![cfg(unix)]

mod common;
use crate::common::init_tracing;

use std::fs;
use std::path::Path;

use dagbuild::cli::CliArgs;
use dagbuild::dag::{SuccessKind, TaskRunState};
use dagbuild::errors::DagbuildError;
use tempfile::TempDir;

const BUILD_FILE: &str = r#"
[config]
parallelism = 2

[task.gen]
cmd = "mkdir -p build && cat src/in.txt > build/gen.txt"
inputs = ["src/**"]
outputs = ["build/gen.txt"]
cacheable = true

[task.pack]
cmd = "mkdir -p dist && cat build/gen.txt build/gen.txt > dist/out.txt && echo run >> pack.log"
depends_on = ["gen"]
inputs = ["build/gen.txt"]
outputs = ["dist/out.txt"]
"#;

fn args(root: &Path, tasks: &[&str]) -> CliArgs {
    CliArgs {
        tasks: tasks.iter().map(|s| s.to_string()).collect(),
        config: root.join("Dagbuild.toml").to_string_lossy().into_owned(),
        exclude_tasks: Vec::new(),
        jobs: None,
        keep_going: false,
        rerun_tasks: false,
        no_build_cache: false,
        dry_run: false,
        continuous: false,
        log_level: None,
    }
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Dagbuild.toml"), BUILD_FILE).unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/in.txt"), "hello\n").unwrap();
    dir
}

fn pack_runs(root: &Path) -> usize {
    fs::read_to_string(root.join("pack.log"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

const EXECUTED: Option<TaskRunState> = Some(TaskRunState::Succeeded(SuccessKind::Executed));
const UP_TO_DATE: Option<TaskRunState> = Some(TaskRunState::Succeeded(SuccessKind::UpToDate));
const FROM_CACHE: Option<TaskRunState> = Some(TaskRunState::Succeeded(SuccessKind::FromCache));

#[tokio::test]
async fn incremental_builds_skip_restore_and_rerun() {
    init_tracing();
    let dir = project();
    let root = dir.path();

    let report = dagbuild::run(args(root, &["pack"])).await.unwrap();
    assert_eq!(report.state_of("gen"), EXECUTED);
    assert_eq!(report.state_of("pack"), EXECUTED);
    assert_eq!(fs::read_to_string(root.join("dist/out.txt")).unwrap(), "hello\nhello\n");

    let report = dagbuild::run(args(root, &["pa"])).await.unwrap();
    assert_eq!(report.state_of("gen"), UP_TO_DATE);
    assert_eq!(report.state_of("pack"), UP_TO_DATE);
    assert_eq!(pack_runs(root), 1);

    // Deleted cacheable outputs come back from the cache; the dependent
    // sees identical inputs and stays up-to-date.
    fs::remove_file(root.join("build/gen.txt")).unwrap();
    let report = dagbuild::run(args(root, &["pack"])).await.unwrap();
    assert_eq!(report.state_of("gen"), FROM_CACHE);
    assert_eq!(report.state_of("pack"), UP_TO_DATE);
    assert_eq!(fs::read_to_string(root.join("build/gen.txt")).unwrap(), "hello\n");

    fs::write(root.join("src/in.txt"), "bye\n").unwrap();
    let report = dagbuild::run(args(root, &["pack"])).await.unwrap();
    assert_eq!(report.state_of("gen"), EXECUTED);
    assert_eq!(report.state_of("pack"), EXECUTED);
    assert_eq!(fs::read_to_string(root.join("dist/out.txt")).unwrap(), "bye\nbye\n");
    assert_eq!(pack_runs(root), 2);

    assert!(root.join(".dagbuild/history").is_file());
}

#[tokio::test]
async fn rerun_tasks_executes_everything() {
    init_tracing();
    let dir = project();
    let root = dir.path();

    dagbuild::run(args(root, &["pack"])).await.unwrap();
    let mut forced = args(root, &["pack"]);
    forced.rerun_tasks = true;
    let report = dagbuild::run(forced).await.unwrap();

    assert_eq!(report.state_of("gen"), EXECUTED);
    assert_eq!(report.state_of("pack"), EXECUTED);
    assert_eq!(pack_runs(root), 2);
}

#[tokio::test]
async fn no_build_cache_rebuilds_deleted_outputs() {
    init_tracing();
    let dir = project();
    let root = dir.path();

    dagbuild::run(args(root, &["pack"])).await.unwrap();
    fs::remove_file(root.join("build/gen.txt")).unwrap();

    let mut uncached = args(root, &["pack"]);
    uncached.no_build_cache = true;
    let report = dagbuild::run(uncached).await.unwrap();

    assert_eq!(report.state_of("gen"), EXECUTED);
    assert_eq!(report.state_of("pack"), UP_TO_DATE);
    assert_eq!(fs::read_to_string(root.join("build/gen.txt")).unwrap(), "hello\n");
}

#[tokio::test]
async fn failing_command_fails_the_build() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("Dagbuild.toml"),
        r#"
[task.bad]
cmd = "echo broken >&2; exit 3"

[task.after]
cmd = "touch after.txt"
depends_on = ["bad"]
"#,
    )
    .unwrap();

    let err = dagbuild::run(args(dir.path(), &[])).await.unwrap_err();
    match err {
        DagbuildError::BuildFailed { failed } => assert_eq!(failed, vec!["bad".to_string()]),
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert!(!dir.path().join("after.txt").exists());
}

#[tokio::test]
async fn timeouts_kill_the_command() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("Dagbuild.toml"),
        r#"
[task.slow]
cmd = "sleep 10"
timeout = "200ms"
"#,
    )
    .unwrap();

    let started = std::time::Instant::now();
    let err = dagbuild::run(args(dir.path(), &[])).await.unwrap_err();
    assert!(matches!(err, DagbuildError::BuildFailed { .. }));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    init_tracing();
    let dir = project();
    let mut dry = args(dir.path(), &["pack"]);
    dry.dry_run = true;

    let report = dagbuild::run(dry).await.unwrap();
    assert!(report.entries().is_empty());
    assert!(!dir.path().join("build").exists());
}
