// src/incremental/decision.rs

use std::fmt;

use crate::dag::spec::TaskSpec;
use crate::incremental::history::HistoryRecord;

/// Why a task has to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MustRunReason {
    /// `--rerun-tasks` was given.
    Forced,
    /// Without outputs there is nothing to compare against.
    NoOutputsDeclared,
    /// No successful execution recorded (first run, or the last one failed).
    NoHistory,
    InputsChanged,
    /// Outputs were modified or deleted since the last execution.
    OutputsChanged,
}

impl fmt::Display for MustRunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MustRunReason::Forced => "rerun forced",
            MustRunReason::NoOutputsDeclared => "no outputs declared",
            MustRunReason::NoHistory => "no previous execution",
            MustRunReason::InputsChanged => "inputs changed",
            MustRunReason::OutputsChanged => "outputs changed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    UpToDate,
    MustRun(MustRunReason),
}

/// Decide whether `spec` is up-to-date.
///
/// `current_output` is only consulted when the inputs match, so callers may
/// pass `None` to skip hashing outputs they don't need.
pub fn decide(
    spec: &TaskSpec,
    record: Option<&HistoryRecord>,
    current_input: &str,
    current_output: Option<&str>,
    force: bool,
) -> Decision {
    if force {
        return Decision::MustRun(MustRunReason::Forced);
    }
    if !spec.has_outputs() {
        return Decision::MustRun(MustRunReason::NoOutputsDeclared);
    }
    let Some(record) = record else {
        return Decision::MustRun(MustRunReason::NoHistory);
    };
    if record.input != current_input {
        return Decision::MustRun(MustRunReason::InputsChanged);
    }
    match current_output {
        Some(output) if output == record.output => Decision::UpToDate,
        _ => Decision::MustRun(MustRunReason::OutputsChanged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec(outputs: &[&str]) -> TaskSpec {
        TaskSpec {
            name: "jar".into(),
            cmd: "zip".into(),
            description: None,
            dir: PathBuf::from("/proj"),
            inputs: Vec::new(),
            exclude: Vec::new(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            properties: Default::default(),
            env: Default::default(),
            cacheable: false,
            timeout: None,
            deps: Vec::new(),
        }
    }

    fn rec(input: &str, output: &str) -> HistoryRecord {
        HistoryRecord {
            input: input.into(),
            output: output.into(),
        }
    }

    #[test]
    fn decision_table() {
        let with_outputs = spec(&["out/**"]);
        let r = rec("i", "o");

        assert_eq!(
            decide(&with_outputs, Some(&r), "i", Some("o"), false),
            Decision::UpToDate
        );
        assert_eq!(
            decide(&with_outputs, Some(&r), "i", Some("o"), true),
            Decision::MustRun(MustRunReason::Forced)
        );
        assert_eq!(
            decide(&spec(&[]), Some(&r), "i", Some("o"), false),
            Decision::MustRun(MustRunReason::NoOutputsDeclared)
        );
        assert_eq!(
            decide(&with_outputs, None, "i", Some("o"), false),
            Decision::MustRun(MustRunReason::NoHistory)
        );
        assert_eq!(
            decide(&with_outputs, Some(&r), "changed", Some("o"), false),
            Decision::MustRun(MustRunReason::InputsChanged)
        );
        assert_eq!(
            decide(&with_outputs, Some(&r), "i", Some("tampered"), false),
            Decision::MustRun(MustRunReason::OutputsChanged)
        );
    }
}
