// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{BuildReason, RuntimeEvent};
use crate::watch::filter::WatchFilter;
use crate::watch::path_utils::canonical_or_self;

/// Quiet period after a relevant change before a rebuild is requested.
/// Editors and compilers usually touch several files at once.
const SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and sends
/// `RuntimeEvent::BuildRequested { reason: FileChange }` whenever a changed
/// path passes `filter`.
///
/// A burst of changes produces a single request.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    filter: WatchFilter,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = canonical_or_self(&root.into());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event_tx.send(event).is_err() {
                    debug!("watcher event loop gone; dropping notify event");
                }
            }
            Err(err) => {
                warn!(error = %err, "file watch error");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = %root.display(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !is_relevant_event(&filter, &event) {
                continue;
            }
            debug!(paths = ?event.paths, "relevant change detected");

            // Swallow the rest of the burst.
            loop {
                match tokio::time::timeout(SETTLE_DELAY, event_rx.recv()).await {
                    Ok(Some(_)) => continue,
                    Ok(None) | Err(_) => break,
                }
            }

            let request = RuntimeEvent::BuildRequested {
                reason: BuildReason::FileChange,
            };
            if runtime_tx.send(request).await.is_err() {
                debug!("runtime gone; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

fn is_relevant_event(filter: &WatchFilter, event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|p| filter.is_relevant(p))
}
