// src/config/mod.rs

//! Build-file loading and validation for dagbuild.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a build file from disk and merge included builds (`loader.rs`).
//! - Validate basic invariants like DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, BUILD_FILE_NAME};
pub use model::{
    ConfigFile, ConfigSection, DefaultSection, IncludeConfig, IncludedBuild, RawConfigFile,
    TaskConfig,
};
