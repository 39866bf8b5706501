// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod incremental;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::BuildCache;
use crate::cli::CliArgs;
use crate::config::loader::{build_dir_of, load_and_validate};
use crate::config::model::ConfigFile;
use crate::dag::{select, ExecutionPlan, Scheduler, TaskGraph};
use crate::engine::{BuildReason, BuildReport, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::{DagbuildError, Result};
use crate::exec::{RealExecutorBackend, WorkerPool};
use crate::fs::{FileSystem, RealFileSystem};
use crate::incremental::{FileHistoryStore, HistoryStore, IncrementalEngine, MemoryHistoryStore};
use crate::types::{FailureMode, HistoryStorageMode};
use crate::watch::path_utils::canonical_or_self;
use crate::watch::WatchFilter;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - build file loading and CLI overrides
/// - task selection and the execution plan
/// - history store, build cache and the incremental engine
/// - scheduler / runtime / executor
/// - (optional) file watcher for `--continuous`
/// - Ctrl-C handling
///
/// Returns the report of the last build, or [`DagbuildError::BuildFailed`]
/// when that build did not succeed.
pub async fn run(args: CliArgs) -> Result<BuildReport> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args);

    let root = canonical_or_self(&build_dir_of(&config_path));
    let graph = TaskGraph::from_config(&cfg, &root)?;
    let plan = select(
        &graph,
        &args.tasks,
        &args.exclude_tasks,
        &cfg.config_section().default_tasks,
    )?;

    if args.dry_run {
        print_dry_run(&cfg, &plan);
        return Ok(BuildReport::new(0, Vec::new(), false));
    }

    let state_dir = cfg.state_dir(&root);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let incremental = Arc::new(build_incremental_engine(&cfg, &args, &graph, &state_dir, fs)?);

    let section = cfg.config_section();
    let parallelism = section.effective_parallelism();
    let failure_mode = section.failure_mode;
    info!(
        tasks = plan.len(),
        parallelism,
        ?failure_mode,
        continuous = args.continuous,
        "starting build"
    );

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(256);

    let executor = RealExecutorBackend::new(rt_tx.clone(), WorkerPool::new(parallelism), incremental);

    // Optional file watcher (continuous mode only).
    let _watcher_handle = if args.continuous {
        let filter = WatchFilter::from_plan(&plan, &state_dir)?;
        Some(crate::watch::spawn_watcher(&root, filter, rt_tx.clone())?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown; a second Ctrl-C exits without waiting.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                if tx.send(RuntimeEvent::ShutdownRequested).await.is_err() {
                    return;
                }
            }
        });
    }

    rt_tx
        .send(RuntimeEvent::BuildRequested {
            reason: BuildReason::Initial,
        })
        .await
        .map_err(errors::Error::from)?;

    let options = RuntimeOptions {
        continuous: args.continuous,
    };

    // Construct the pure core runtime (single source of truth for semantics).
    let core = CoreRuntime::new(Scheduler::new(plan, failure_mode), options);

    // Construct the async IO shell around the core.
    let mut runtime = Runtime::new(core, rt_rx, executor);
    if args.continuous {
        runtime = runtime.with_report_hook(Box::new(|report: &BuildReport| {
            println!("{report}");
            println!("waiting for changes to task inputs (Ctrl-C to stop)");
        }));
    }
    let report = runtime.run().await?;

    if !args.continuous {
        println!("{report}");
    }

    if report.is_success() {
        Ok(report)
    } else {
        Err(DagbuildError::BuildFailed {
            failed: unsuccessful_tasks(&report),
        })
    }
}

/// Apply `--jobs` and `--continue` on top of `[config]`.
fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    let section = cfg.config_section_mut();
    if let Some(jobs) = args.jobs {
        section.parallelism = Some(jobs.max(1));
    }
    if args.keep_going {
        section.failure_mode = FailureMode::FailAtEnd;
    }
}

fn build_incremental_engine(
    cfg: &ConfigFile,
    args: &CliArgs,
    graph: &TaskGraph,
    state_dir: &Path,
    fs: Arc<dyn FileSystem>,
) -> Result<IncrementalEngine> {
    let section = cfg.config_section();

    let history: Box<dyn HistoryStore> = match section.history {
        HistoryStorageMode::File => Box::new(FileHistoryStore::new(state_dir, fs.clone())),
        HistoryStorageMode::Memory => Box::new(MemoryHistoryStore::new()),
    };

    let mut engine = IncrementalEngine::new(fs.clone(), state_dir, history).with_force(args.rerun_tasks);
    if section.build_cache && !args.no_build_cache {
        engine = engine.with_cache(BuildCache::new(state_dir, fs));
    } else {
        debug!("build cache disabled");
    }

    // Drop history of tasks that no longer exist (renamed or removed).
    let active: Vec<&str> = graph.tasks().collect();
    if let Err(e) = engine.prune_history(&active) {
        warn!(error = %e, "failed to prune stale task history");
    }

    Ok(engine)
}

/// Failed and cancelled tasks, or, for an interrupted build where nothing
/// failed, the tasks that never completed.
fn unsuccessful_tasks(report: &BuildReport) -> Vec<String> {
    let failed = report.failed_tasks();
    if !failed.is_empty() {
        return failed;
    }
    report
        .entries()
        .iter()
        .filter(|(_, state)| !state.is_success())
        .map(|(name, _)| name.clone())
        .collect()
}

/// Print the plan level by level; tasks within a level can run in parallel.
fn print_dry_run(cfg: &ConfigFile, plan: &ExecutionPlan) {
    let section = cfg.config_section();
    println!("dagbuild dry-run");
    println!("  config.parallelism = {}", section.effective_parallelism());
    println!("  config.failure_mode = {:?}", section.failure_mode);
    println!("  config.build_cache = {}", section.build_cache);
    println!();

    println!("plan ({} task(s)):", plan.len());
    for (depth, level) in plan.levels().iter().enumerate() {
        println!("  level {depth}:");
        for name in level.iter() {
            println!("    - {name}");
            if let Some(spec) = plan.spec(name) {
                println!("        cmd: {}", spec.cmd);
                let deps = plan.dependencies_of(name);
                if !deps.is_empty() {
                    println!("        depends_on: {:?}", deps);
                }
                if !spec.outputs.is_empty() {
                    println!("        outputs: {:?}", spec.outputs);
                }
                if spec.cacheable {
                    println!("        cacheable: true");
                }
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
