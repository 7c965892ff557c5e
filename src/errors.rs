// src/errors.rs

//! Crate-wide error types.
//!
//! - [`GraphError`] is raised while building or validating a [`TaskGraph`].
//! - [`TaskExecutionError`] is what a single task's action produced; it is
//!   only ever stored in an [`ExecutionReport`], never returned from `run()`.
//! - [`SchedulerError`] aborts a whole run.
//! - [`TaskdagError`] is the application-level error used by config loading
//!   and the CLI.
//!
//! [`TaskGraph`]: crate::dag::TaskGraph
//! [`ExecutionReport`]: crate::engine::ExecutionReport

use thiserror::Error;

use crate::types::TaskId;

/// Construction-time graph errors.
///
/// Whenever one of these is returned from a graph-building call, the graph
/// is left exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("task already registered: {0}")]
    DuplicateTask(TaskId),

    #[error("task '{task}' has unknown dependency '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("task not found: {0}")]
    UnknownTask(TaskId),

    #[error("cycle detected: '{to}' cannot depend on '{from}'")]
    Cycle { from: TaskId, to: TaskId },

    #[error("cycle detected among tasks: {0:?}")]
    CycleDetected(Vec<TaskId>),
}

/// Error recorded for a single task in the execution report.
#[derive(Error, Debug)]
pub enum TaskExecutionError {
    #[error("task failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Errors that abort a whole `Scheduler::run`.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid task graph: {0}")]
    Graph(#[from] GraphError),

    /// Ready queue drained while tasks were still unresolved and nothing was
    /// running. Unreachable for a validated graph; always a bug.
    #[error(
        "deadlock: no runnable tasks while {} remain unresolved: {unresolved:?}",
        unresolved.len()
    )]
    Deadlock { unresolved: Vec<TaskId> },

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

#[derive(Error, Debug)]
pub enum TaskdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskdagError>;
