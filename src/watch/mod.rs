// src/watch/mod.rs

//! File watching for continuous mode.
//!
//! This module wires up a cross-platform filesystem watcher (`notify`) and
//! turns changes to task inputs into rebuild requests. It does not decide
//! which tasks run; the next build re-checks every task's fingerprints.

pub mod filter;
pub mod path_utils;
pub mod watcher;

pub use filter::WatchFilter;
pub use watcher::{spawn_watcher, WatcherHandle};
