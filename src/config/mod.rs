// src/config/mod.rs

//! Configuration loading and validation for task graph files.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it, including building the task graph once (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, RawConfigFile, SchedulerSection, TaskConfig};
