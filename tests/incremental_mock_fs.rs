// tests/incremental_mock_fs.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::spec_of;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dagbuild::cache::BuildCache;
use dagbuild::dag::TaskSpec;
use dagbuild::fs::mock::MockFileSystem;
use dagbuild::fs::FileSystem;
use dagbuild::incremental::{IncrementalEngine, MemoryHistoryStore, MustRunReason, Preparation};

const STATE_DIR: &str = "/proj/.dagbuild";

fn compile_spec(cacheable: bool) -> Arc<TaskSpec> {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "compile",
            TaskConfigBuilder::new("cc -c src/a.c -o build/a.o")
                .input("src/**")
                .output("build/**")
                .cacheable(cacheable)
                .build(),
        )
        .with_task("check", TaskConfigBuilder::new("lint").input("src/**").build())
        .build();
    spec_of(&cfg, "compile", Path::new("/proj"))
}

fn engine(fs: &MockFileSystem, with_cache: bool) -> IncrementalEngine {
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let engine = IncrementalEngine::new(
        shared.clone(),
        STATE_DIR,
        Box::new(MemoryHistoryStore::new()),
    );
    if with_cache {
        engine.with_cache(BuildCache::new(Path::new(STATE_DIR), shared))
    } else {
        engine
    }
}

/// Run `prepare`, and when it says so, "execute" by writing `output` and
/// record the success.
fn build(engine: &IncrementalEngine, fs: &MockFileSystem, spec: &TaskSpec, output: &str) -> Preparation {
    let prep = engine.prepare(spec).unwrap();
    if let Preparation::Execute { inputs, .. } = &prep {
        fs.add_file("/proj/build/a.o", output.as_bytes().to_vec());
        engine.record_success(spec, inputs).unwrap();
    }
    prep
}

fn reason(prep: &Preparation) -> Option<MustRunReason> {
    match prep {
        Preparation::Execute { reason, .. } => Some(*reason),
        _ => None,
    }
}

#[test]
fn second_build_is_up_to_date_until_inputs_change() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.c", "int a;");
    let spec = compile_spec(false);
    let engine = engine(&fs, false);

    let first = build(&engine, &fs, &spec, "obj-v1");
    assert_eq!(reason(&first), Some(MustRunReason::NoHistory));
    assert_eq!(build(&engine, &fs, &spec, "unused"), Preparation::UpToDate);

    fs.add_file("/proj/src/a.c", "int a = 1;");
    let third = build(&engine, &fs, &spec, "obj-v2");
    assert_eq!(reason(&third), Some(MustRunReason::InputsChanged));

    // A new input file also counts as a change.
    fs.add_file("/proj/src/b.c", "int b;");
    assert_eq!(
        reason(&engine.prepare(&spec).unwrap()),
        Some(MustRunReason::InputsChanged)
    );
}

#[test]
fn tampered_or_deleted_outputs_force_a_rerun() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.c", "int a;");
    let spec = compile_spec(false);
    let engine = engine(&fs, false);
    build(&engine, &fs, &spec, "obj");

    fs.add_file("/proj/build/a.o", "edited by hand");
    assert_eq!(
        reason(&engine.prepare(&spec).unwrap()),
        Some(MustRunReason::OutputsChanged)
    );

    fs.remove_file(Path::new("/proj/build/a.o")).unwrap();
    assert_eq!(
        reason(&engine.prepare(&spec).unwrap()),
        Some(MustRunReason::OutputsChanged)
    );
}

#[test]
fn outputs_come_back_from_the_cache() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.c", "int a;");
    let spec = compile_spec(true);
    let engine = engine(&fs, true);

    build(&engine, &fs, &spec, "obj-v1");

    // Deleted outputs are restored instead of rebuilt.
    fs.remove_file(Path::new("/proj/build/a.o")).unwrap();
    assert_eq!(
        engine.prepare(&spec).unwrap(),
        Preparation::FromCache { restored: 1 }
    );
    assert_eq!(
        fs.read_to_string(Path::new("/proj/build/a.o")).unwrap(),
        "obj-v1"
    );
    assert_eq!(engine.prepare(&spec).unwrap(), Preparation::UpToDate);

    // Change, rebuild, then revert: the old outputs are reused.
    fs.add_file("/proj/src/a.c", "int a = 2;");
    assert!(reason(&build(&engine, &fs, &spec, "obj-v2")).is_some());
    fs.add_file("/proj/src/a.c", "int a;");
    assert_eq!(
        engine.prepare(&spec).unwrap(),
        Preparation::FromCache { restored: 1 }
    );
    assert_eq!(
        fs.read_to_string(Path::new("/proj/build/a.o")).unwrap(),
        "obj-v1"
    );
}

#[test]
fn forced_runs_skip_history_and_cache() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.c", "int a;");
    let spec = compile_spec(true);
    let first = engine(&fs, true);
    build(&first, &fs, &spec, "obj");

    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let forced = IncrementalEngine::new(shared.clone(), STATE_DIR, Box::new(MemoryHistoryStore::new()))
        .with_cache(BuildCache::new(Path::new(STATE_DIR), shared))
        .with_force(true);
    fs.remove_file(Path::new("/proj/build/a.o")).unwrap();
    assert_eq!(
        reason(&forced.prepare(&spec).unwrap()),
        Some(MustRunReason::Forced)
    );
}

#[test]
fn failure_erases_history() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.c", "int a;");
    let spec = compile_spec(false);
    let engine = engine(&fs, false);
    build(&engine, &fs, &spec, "obj");
    assert!(engine.history_record("compile").unwrap().is_some());

    engine.record_failure(&spec).unwrap();
    assert!(engine.history_record("compile").unwrap().is_none());
    assert_eq!(
        reason(&engine.prepare(&spec).unwrap()),
        Some(MustRunReason::NoHistory)
    );
}

#[test]
fn tasks_without_outputs_always_run() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.c", "int a;");
    let cfg = ConfigFileBuilder::new()
        .with_task("check", TaskConfigBuilder::new("lint").input("src/**").build())
        .build();
    let spec = spec_of(&cfg, "check", Path::new("/proj"));
    let engine = engine(&fs, true);

    for _ in 0..2 {
        let prep = engine.prepare(&spec).unwrap();
        assert_eq!(reason(&prep), Some(MustRunReason::NoOutputsDeclared));
        if let Preparation::Execute { inputs, .. } = prep {
            engine.record_success(&spec, &inputs).unwrap();
        }
    }
}

/// Mock filesystem that refuses to delete anything.
#[derive(Debug)]
struct NoRemoveFs(MockFileSystem);

impl FileSystem for NoRemoveFs {
    fn read_to_string(&self, path: &Path) -> anyhow::Result<String> {
        self.0.read_to_string(path)
    }
    fn open_read(&self, path: &Path) -> anyhow::Result<Box<dyn Read + Send>> {
        self.0.open_read(path)
    }
    fn write(&self, path: &Path, contents: &[u8]) -> anyhow::Result<()> {
        self.0.write(path, contents)
    }
    fn remove_file(&self, path: &Path) -> anyhow::Result<()> {
        anyhow::bail!("cannot remove {path:?}: read-only")
    }
    fn exists(&self, path: &Path) -> bool {
        self.0.exists(path)
    }
    fn is_file(&self, path: &Path) -> bool {
        self.0.is_file(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        self.0.is_dir(path)
    }
    fn read_dir(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>> {
        self.0.read_dir(path)
    }
}

#[test]
fn corrupt_entry_that_cannot_be_invalidated_is_still_a_miss() {
    let mock = MockFileSystem::new();
    mock.add_file("/proj/src/a.c", "int a;");
    let spec = compile_spec(true);

    let shared: Arc<dyn FileSystem> = Arc::new(NoRemoveFs(mock.clone()));
    let engine = IncrementalEngine::new(shared.clone(), STATE_DIR, Box::new(MemoryHistoryStore::new()))
        .with_cache(BuildCache::new(Path::new(STATE_DIR), shared));

    let Preparation::Execute { inputs, .. } = build(&engine, &mock, &spec, "obj") else {
        panic!("first build must execute");
    };
    let cached = format!("{STATE_DIR}/cache/{}/files/build/a.o", inputs.fingerprint);
    mock.add_file(&cached, "bit rot");
    mock.remove_file(Path::new("/proj/build/a.o")).unwrap();

    assert_eq!(
        reason(&engine.prepare(&spec).unwrap()),
        Some(MustRunReason::OutputsChanged)
    );
    assert!(!mock.exists(Path::new("/proj/build/a.o")));
}
