// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Name of the graph file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Taskdag.toml";

/// Read and deserialize a graph file.
///
/// Only TOML syntax and field types are checked here. Dependency references,
/// cycles and scheduler values are checked by [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let raw = parse_str(&contents)?;
    debug!(path = %path.display(), tasks = raw.task.len(), "config file parsed");
    Ok(raw)
}

/// Deserialize a graph file from an in-memory string.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// [`load_from_path`] followed by full validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}
