// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, build_graph, deadline_from_secs};
use crate::errors::{GraphError, Result, TaskdagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_scheduler_section(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskdagError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(cfg: &RawConfigFile) -> Result<()> {
    // failure_policy is strongly typed and checked during deserialization.

    if cfg.scheduler.pool_size == Some(0) {
        return Err(TaskdagError::ConfigError(
            "[scheduler].pool_size must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(secs) = cfg.scheduler.deadline_secs {
        if deadline_from_secs(secs).is_none() {
            return Err(TaskdagError::ConfigError(format!(
                "[scheduler].deadline_secs must be a positive number of seconds \
                 small enough for a duration (got {secs})"
            )));
        }
    }

    Ok(())
}

/// Build the real graph once; the graph itself rejects cycles and dangling
/// references.
fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    let graph = build_graph(&cfg.task)?;
    match graph.validate() {
        Ok(()) => Ok(()),
        Err(GraphError::UnknownDependency { task, dependency }) => {
            Err(TaskdagError::ConfigError(format!(
                "task '{task}' has unknown dependency '{dependency}' in `after`"
            )))
        }
        Err(e) => Err(e.into()),
    }
}
