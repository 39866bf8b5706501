// src/incremental/history.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::engine::TaskName;
use crate::fs::FileSystem;
use crate::incremental::hash::is_digest;

/// File name of the history file inside the state directory.
pub const HISTORY_FILE_NAME: &str = "history";

/// Fingerprints of a task's last successful execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub input: String,
    pub output: String,
}

/// Abstract storage for execution history.
pub trait HistoryStore: Send + Sync {
    fn load(&self, task: &str) -> Result<Option<HistoryRecord>>;
    fn save(&mut self, task: &str, record: &HistoryRecord) -> Result<()>;
    /// Forget a task, e.g. after a failed execution.
    fn remove(&mut self, task: &str) -> Result<()>;
    /// Remove history for tasks that are not in `active_tasks`.
    fn prune(&mut self, active_tasks: &[&str]) -> Result<()>;
}

/// Stores history in `<state_dir>/history`, one `name input output` line
/// per task.
pub struct FileHistoryStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileHistoryStore {
    pub fn new(state_dir: &Path, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: state_dir.join(HISTORY_FILE_NAME),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> Result<BTreeMap<TaskName, HistoryRecord>> {
        let mut map = BTreeMap::new();
        if !self.fs.exists(&self.path) {
            return Ok(map);
        }

        let content = self
            .fs
            .read_to_string(&self.path)
            .with_context(|| format!("reading history file at {:?}", self.path))?;

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut parts = trimmed.split_whitespace();
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(input), Some(output), None)
                    if is_digest(input) && is_digest(output) =>
                {
                    map.insert(
                        name.to_string(),
                        HistoryRecord {
                            input: input.to_string(),
                            output: output.to_string(),
                        },
                    );
                }
                _ => {
                    warn!(line = idx + 1, path = ?self.path, "ignoring malformed history line");
                }
            }
        }

        Ok(map)
    }

    fn save_all(&self, map: &BTreeMap<TaskName, HistoryRecord>) -> Result<()> {
        let mut out = String::new();
        for (name, record) in map.iter() {
            out.push_str(&format!("{} {} {}\n", name, record.input, record.output));
        }
        self.fs
            .write(&self.path, out.as_bytes())
            .with_context(|| format!("writing history file at {:?}", self.path))
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self, task: &str) -> Result<Option<HistoryRecord>> {
        Ok(self.load_all()?.remove(task))
    }

    fn save(&mut self, task: &str, record: &HistoryRecord) -> Result<()> {
        let mut map = self.load_all()?;
        map.insert(task.to_string(), record.clone());
        self.save_all(&map)?;
        debug!(task = %task, input = %record.input, "stored execution history (file)");
        Ok(())
    }

    fn remove(&mut self, task: &str) -> Result<()> {
        let mut map = self.load_all()?;
        if map.remove(task).is_some() {
            self.save_all(&map)?;
            debug!(task = %task, "removed execution history (file)");
        }
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let mut map = self.load_all()?;
        let initial_len = map.len();
        map.retain(|k, _| active_tasks.contains(&k.as_str()));

        if map.len() < initial_len {
            self.save_all(&map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale execution history (file)"
            );
        }
        Ok(())
    }
}

/// Stores history in memory only.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    map: BTreeMap<TaskName, HistoryRecord>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self, task: &str) -> Result<Option<HistoryRecord>> {
        Ok(self.map.get(task).cloned())
    }

    fn save(&mut self, task: &str, record: &HistoryRecord) -> Result<()> {
        self.map.insert(task.to_string(), record.clone());
        debug!(task = %task, input = %record.input, "stored execution history (memory)");
        Ok(())
    }

    fn remove(&mut self, task: &str) -> Result<()> {
        self.map.remove(task);
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let initial_len = self.map.len();
        self.map.retain(|k, _| active_tasks.contains(&k.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned stale execution history (memory)"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::incremental::hash::compute_bytes_hash;

    fn record(seed: &str) -> HistoryRecord {
        HistoryRecord {
            input: compute_bytes_hash(format!("in-{seed}").as_bytes()),
            output: compute_bytes_hash(format!("out-{seed}").as_bytes()),
        }
    }

    #[test]
    fn file_store_persists_between_instances() {
        let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
        let state = Path::new("/proj/.dagbuild");

        let mut store = FileHistoryStore::new(state, fs.clone());
        store.save("compile", &record("1")).unwrap();
        store.save("numbers:jar", &record("2")).unwrap();

        let reopened = FileHistoryStore::new(state, fs.clone());
        assert_eq!(reopened.load("compile").unwrap(), Some(record("1")));
        assert_eq!(reopened.load("numbers:jar").unwrap(), Some(record("2")));
        assert_eq!(reopened.load("test").unwrap(), None);
    }

    #[test]
    fn file_store_remove_and_prune() {
        let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
        let mut store = FileHistoryStore::new(Path::new("/proj/.dagbuild"), fs);
        store.save("a", &record("a")).unwrap();
        store.save("b", &record("b")).unwrap();
        store.save("c", &record("c")).unwrap();

        store.remove("a").unwrap();
        store.prune(&["b"]).unwrap();

        assert_eq!(store.load("a").unwrap(), None);
        assert_eq!(store.load("b").unwrap(), Some(record("b")));
        assert_eq!(store.load("c").unwrap(), None);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let mock = MockFileSystem::new();
        let good = record("ok");
        mock.add_file(
            "/proj/.dagbuild/history",
            format!("garbage\nok {} {}\nbad nothex nothex\n", good.input, good.output),
        );
        let store = FileHistoryStore::new(Path::new("/proj/.dagbuild"), Arc::new(mock));

        assert_eq!(store.load("ok").unwrap(), Some(good));
        assert_eq!(store.load("bad").unwrap(), None);
    }
}
