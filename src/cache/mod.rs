// src/cache/mod.rs

//! Local result cache: task outputs stored by input fingerprint so that a
//! task whose inputs were seen before can be satisfied without running it.

pub mod store;

pub use store::{BuildCache, CacheEntry, CachedFile, CACHE_DIR_NAME};
