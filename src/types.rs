use std::str::FromStr;
use serde::Deserialize;

/// What happens to the rest of a run once a task fails.
///
/// - `FailFast`: no new task is started after the first failure; tasks that
///   are already running finish, everything still pending is skipped
///   (default behaviour).
/// - `FailAtEnd`: only tasks that (transitively) depend on the failed task
///   are skipped; independent branches keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    #[default]
    FailFast,
    FailAtEnd,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" => Ok(FailureMode::FailFast),
            "fail-at-end" => Ok(FailureMode::FailAtEnd),
            other => Err(format!(
                "invalid failure_mode: {other} (expected \"fail-fast\" or \"fail-at-end\")"
            )),
        }
    }
}

/// Mode for storing task execution history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStorageMode {
    /// Store history in a file (`<state_dir>/history`).
    #[default]
    File,
    /// Store history in memory only (lost on restart).
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_mode_parses_case_insensitively() {
        assert_eq!("Fail-Fast".parse::<FailureMode>(), Ok(FailureMode::FailFast));
        assert_eq!(" fail-at-end ".parse::<FailureMode>(), Ok(FailureMode::FailAtEnd));
        assert!("sometimes".parse::<FailureMode>().is_err());
    }
}
