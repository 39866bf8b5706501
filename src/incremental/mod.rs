// src/incremental/mod.rs

//! Incremental build support.
//!
//! This module is responsible for:
//! - Hashing files (`blake3`) and compiling input/output glob patterns.
//! - Fingerprinting a task's declared inputs and its outputs.
//! - Persisting the fingerprints of each task's last successful execution.
//! - Deciding whether a task is up-to-date, and consulting the build cache
//!   when it is not.

pub mod decision;
pub mod engine;
pub mod fingerprint;
pub mod hash;
pub mod history;
pub mod patterns;

pub use decision::{decide, Decision, MustRunReason};
pub use engine::{IncrementalEngine, Preparation};
pub use fingerprint::{input_fingerprint, output_fingerprint, FileDigest, Snapshot};
pub use history::{FileHistoryStore, HistoryRecord, HistoryStore, MemoryHistoryStore, HISTORY_FILE_NAME};
pub use patterns::{collect_matching_files, PathMatcher};
