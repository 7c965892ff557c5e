// src/engine/mod.rs

//! Concurrent execution engine.
//!
//! This module ties together:
//! - the [`ReadyQueue`] feeding the worker pool
//! - the [`Scheduler`], which validates a graph, seeds the queue and owns the
//!   pool for exactly one run
//! - the per-worker loop in [`worker`]
//! - the [`ExecutionReport`] handed back once every task is terminal
//! - the [`SchedulerObserver`] hooks

/// Per-task state inside a run.
///
/// `Pending -> Ready -> Running -> {Completed | Failed}`; `Skipped` and
/// `TimedOut` are terminal states reached without finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting on at least one prerequisite.
    Pending,
    /// Prerequisites resolved; sitting in the ready queue.
    Ready,
    /// Picked up by a worker; action in progress.
    Running,
    Completed,
    Failed,
    Skipped,
    TimedOut,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Ready | TaskState::Running)
    }
}

/// State change reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
    TimedOut,
}

impl Transition {
    pub fn name(self) -> &'static str {
        match self {
            Transition::Ready => "ready",
            Transition::Running => "running",
            Transition::Completed => "completed",
            Transition::Failed => "failed",
            Transition::Skipped => "skipped",
            Transition::TimedOut => "timed_out",
        }
    }
}

pub mod observer;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod worker;

pub use observer::{FnObserver, NoopObserver, SchedulerObserver, TracingObserver};
pub use queue::{Pop, ReadyQueue};
pub use report::{ExecutionReport, TaskStatus, TaskTiming};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use crate::types::FailurePolicy;
