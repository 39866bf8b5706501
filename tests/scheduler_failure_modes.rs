// tests/scheduler_failure_modes.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::full_plan;

use dagbuild::dag::{ScheduledTask, Scheduler, TaskRunState};
use dagbuild::engine::TaskOutcome;
use dagbuild::types::FailureMode;

/// a -> {b, c} -> d, plus an independent chain x -> y.
fn scheduler(mode: FailureMode) -> Scheduler {
    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("a").build())
        .with_task("b", TaskConfigBuilder::new("b").depends_on("a").build())
        .with_task("c", TaskConfigBuilder::new("c").depends_on("a").build())
        .with_task(
            "d",
            TaskConfigBuilder::new("d").depends_on("b").depends_on("c").build(),
        )
        .with_task("x", TaskConfigBuilder::new("x").build())
        .with_task("y", TaskConfigBuilder::new("y").depends_on("x").build())
        .build();
    Scheduler::new(full_plan(&cfg), mode)
}

fn names(tasks: &[ScheduledTask]) -> Vec<&str> {
    tasks.iter().map(|t| t.name.as_str()).collect()
}

#[test]
fn fail_fast_skips_everything_not_yet_started() {
    let mut s = scheduler(FailureMode::FailFast);
    assert_eq!(names(&s.start_new_run()), vec!["a", "x"]);

    let ready = s.handle_completion("a", TaskOutcome::Executed);
    assert_eq!(names(&ready), vec!["b", "c"]);

    let step = s.step_completion("b", TaskOutcome::Failed(2));
    assert!(step.newly_scheduled.is_empty());
    let mut skipped = step.newly_skipped.clone();
    skipped.sort();
    assert_eq!(skipped, vec!["d".to_string(), "y".to_string()]);

    // Already-running tasks still finish and are recorded.
    assert!(!s.step_completion("c", TaskOutcome::Executed).run_just_finished);
    let step = s.step_completion("x", TaskOutcome::Executed);
    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_just_finished);

    let report = s.report().unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed_tasks(), vec!["b".to_string()]);
    assert_eq!(report.state_of("b"), Some(TaskRunState::Failed(2)));
    assert_eq!(report.state_of("y"), Some(TaskRunState::Skipped));
}

#[test]
fn fail_at_end_keeps_independent_work_going() {
    let mut s = scheduler(FailureMode::FailAtEnd);
    s.start_new_run();
    s.handle_completion("a", TaskOutcome::Executed);

    let step = s.step_completion("b", TaskOutcome::Failed(1));
    assert_eq!(step.newly_skipped, vec!["d".to_string()]);

    let ready = s.handle_completion("x", TaskOutcome::UpToDate);
    assert_eq!(names(&ready), vec!["y"]);

    s.handle_completion("c", TaskOutcome::FromCache);
    let step = s.step_completion("y", TaskOutcome::Executed);
    assert!(step.run_just_finished);

    let report = s.report().unwrap();
    let counts = report.counts();
    assert_eq!(counts.executed, 2);
    assert_eq!(counts.up_to_date, 1);
    assert_eq!(counts.from_cache, 1);
    assert_eq!(report.state_of("d"), Some(TaskRunState::Skipped));
    assert!(!report.is_success());
}

#[test]
fn new_run_resets_previous_outcomes() {
    let mut s = scheduler(FailureMode::FailAtEnd);
    s.start_new_run();
    for task in ["a", "x", "b", "c", "y", "d"] {
        s.handle_completion(task, TaskOutcome::Executed);
    }
    assert!(s.is_idle());
    assert!(s.report().unwrap().is_success());

    let ready = s.start_new_run();
    assert_eq!(names(&ready), vec!["a", "x"]);
    assert_eq!(s.current_run_id(), Some(2));
    assert_eq!(s.run_state_of("d"), Some(TaskRunState::Pending));
    assert_eq!(s.tasks_in_current_run().len(), 6);
}

#[test]
fn report_renders_one_line_per_task() {
    let mut s = scheduler(FailureMode::FailFast);
    s.start_new_run();
    s.handle_completion("a", TaskOutcome::Failed(3));
    s.handle_completion("x", TaskOutcome::Executed);

    let text = s.report().unwrap().to_string();
    assert!(text.contains("FAILED (exit code 3)"), "{text}");
    assert!(text.contains("SKIPPED"), "{text}");
    assert!(text.contains("BUILD FAILED"), "{text}");
}
