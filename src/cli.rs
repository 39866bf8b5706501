// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::BUILD_FILE_NAME;

/// Command-line arguments for `dagbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagbuild",
    version,
    about = "Run declared build tasks in dependency order, skipping up-to-date work.",
    long_about = None
)]
pub struct CliArgs {
    /// Tasks to run (exact names or unique prefixes, e.g. `comp` or `lib:ja`).
    ///
    /// If omitted, `[config].default_tasks` is used, or every task when that
    /// is empty too.
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Path to the build file (TOML).
    #[arg(long, value_name = "PATH", default_value = BUILD_FILE_NAME)]
    pub config: String,

    /// Exclude a task (and whatever only it needs) from the plan.
    #[arg(short = 'x', long = "exclude-task", value_name = "TASK")]
    pub exclude_tasks: Vec<String>,

    /// Maximum number of tasks running at the same time.
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Keep running independent tasks after a failure (fail-at-end).
    #[arg(long = "continue")]
    pub keep_going: bool,

    /// Ignore up-to-date checks and cached results; run every task.
    #[arg(long)]
    pub rerun_tasks: bool,

    /// Do not read from or write to the local build cache.
    #[arg(long)]
    pub no_build_cache: bool,

    /// Parse + validate, print the execution plan, but run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// After the build, watch task inputs and rebuild on change.
    #[arg(long)]
    pub continuous: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_list_with_flags() {
        let args = CliArgs::parse_from([
            "dagbuild",
            "test",
            "coverageVerification",
            "-x",
            "lint",
            "-j",
            "2",
            "--continue",
        ]);
        assert_eq!(args.tasks, vec!["test", "coverageVerification"]);
        assert_eq!(args.exclude_tasks, vec!["lint"]);
        assert_eq!(args.jobs, Some(2));
        assert!(args.keep_going);
        assert_eq!(args.config, "Dagbuild.toml");
    }
}
