// tests/graph_selection.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};

use std::path::Path;

use dagbuild::config::ConfigFile;
use dagbuild::dag::{resolve_task_name, select, TaskGraph};
use dagbuild::errors::DagbuildError;

/// compile -> compileTest -> test, compile -> jar, lint standalone.
fn java_like() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("compile", TaskConfigBuilder::new("javac").build())
        .with_task(
            "compileTest",
            TaskConfigBuilder::new("javac tests").depends_on("compile").build(),
        )
        .with_task(
            "test",
            TaskConfigBuilder::new("run tests")
                .depends_on("compileTest")
                .depends_on("lint")
                .build(),
        )
        .with_task("jar", TaskConfigBuilder::new("jar").depends_on("compile").build())
        .with_task("lint", TaskConfigBuilder::new("lint").build())
        .build()
}

fn graph(cfg: &ConfigFile) -> TaskGraph {
    TaskGraph::from_config(cfg, Path::new("/proj")).unwrap()
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn abbreviated_names_resolve_when_unique() {
    let cfg = java_like();
    let g = graph(&cfg);

    assert_eq!(resolve_task_name("compile", &g).unwrap(), "compile");
    assert_eq!(resolve_task_name("compileT", &g).unwrap(), "compileTest");
    assert_eq!(resolve_task_name("j", &g).unwrap(), "jar");

    match resolve_task_name("comp", &g) {
        Err(DagbuildError::AmbiguousTask { candidates, .. }) => {
            assert_eq!(candidates, strings(&["compile", "compileTest"]));
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
    assert!(matches!(
        resolve_task_name("deploy", &g),
        Err(DagbuildError::TaskNotFound(_))
    ));
}

#[test]
fn selection_is_the_dependency_closure() {
    let cfg = java_like();
    let g = graph(&cfg);

    let plan = select(&g, &strings(&["jar"]), &[], &[]).unwrap();
    assert_eq!(plan.order(), strings(&["compile", "jar"]).as_slice());

    let plan = select(&g, &strings(&["test"]), &[], &[]).unwrap();
    assert_eq!(
        plan.order(),
        strings(&["compile", "compileTest", "lint", "test"]).as_slice()
    );
    assert_eq!(
        plan.levels(),
        vec![strings(&["compile", "lint"]), strings(&["compileTest"]), strings(&["test"])]
    );
}

#[test]
fn excluded_tasks_and_their_private_dependencies_drop_out() {
    let cfg = java_like();
    let g = graph(&cfg);

    let plan = select(&g, &strings(&["test"]), &strings(&["compileT"]), &[]).unwrap();
    // compile was only reachable through compileTest.
    assert_eq!(plan.order(), strings(&["lint", "test"]).as_slice());
    assert!(plan.dependencies_of("test").iter().all(|d| d == "lint"));
}

#[test]
fn empty_request_uses_default_tasks_then_everything() {
    let cfg = java_like();
    let g = graph(&cfg);

    let plan = select(&g, &[], &[], &strings(&["jar"])).unwrap();
    assert_eq!(plan.len(), 2);

    let plan = select(&g, &[], &[], &[]).unwrap();
    assert_eq!(plan.len(), 5);
    assert_eq!(plan.roots(), strings(&["compile", "lint"]));
}

#[test]
fn dependents_are_tracked_within_the_plan() {
    let cfg = java_like();
    let g = graph(&cfg);

    assert_eq!(g.dependents_of("compile"), strings(&["compileTest", "jar"]).as_slice());

    let plan = select(&g, &strings(&["jar"]), &[], &[]).unwrap();
    assert_eq!(plan.dependents_of("compile"), strings(&["jar"]).as_slice());
    assert!(!plan.contains("compileTest"));
}
