// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::TaskGraph;
use crate::engine::SchedulerConfig;
use crate::errors::GraphError;
use crate::exec::command_action;
use crate::types::FailurePolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// pool_size = 4
/// failure_policy = "fail_fast"
/// deadline_secs = 30
///
/// [task.build]
/// cmd = "cargo build"
///
/// [task.test]
/// cmd = "cargo test"
/// after = ["build"]
/// ```
///
/// This is the unvalidated form; convert it with `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// All tasks from `[task.<name>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[scheduler]` section. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerSection {
    /// Number of workers; defaults to the available parallelism.
    #[serde(default)]
    pub pool_size: Option<usize>,

    /// `"best_effort"` (default) or `"fail_fast"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Wall-clock limit for the whole run, in seconds.
    #[serde(default)]
    pub deadline_secs: Option<f64>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// The shell command to execute.
    pub cmd: String,

    /// Tasks that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
}

/// A validated configuration: at least one task, sane scheduler settings,
/// every `after` reference known, no cycles.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self { scheduler, task }
    }

    /// Scheduler settings from `[scheduler]`, falling back to defaults.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let mut cfg = SchedulerConfig::default().with_failure_policy(self.scheduler.failure_policy);
        if let Some(n) = self.scheduler.pool_size {
            cfg = cfg.with_pool_size(n);
        }
        if let Some(deadline) = self.scheduler.deadline_secs.and_then(deadline_from_secs) {
            cfg = cfg.with_deadline(deadline);
        }
        cfg
    }

    /// Build the task graph, one shell-command action per task.
    pub fn build_graph(&self) -> Result<TaskGraph, GraphError> {
        build_graph(&self.task)
    }
}

/// A run deadline from seconds. `None` unless `secs` is positive and fits in a
/// `Duration`.
pub(crate) fn deadline_from_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Tasks are registered in key order; `after` may name tasks that come later
/// because the graph resolves forward references on registration.
pub(crate) fn build_graph(tasks: &BTreeMap<String, TaskConfig>) -> Result<TaskGraph, GraphError> {
    let mut graph = TaskGraph::new();
    for (name, task) in tasks {
        graph.add_task(
            name.clone(),
            command_action(task.cmd.clone()),
            task.after.iter().cloned(),
        )?;
    }
    Ok(graph)
}
