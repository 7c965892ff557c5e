// src/engine/report.rs

//! Terminal result of a scheduler run.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use crate::errors::TaskExecutionError;
use crate::types::TaskId;

/// Final status of a task in an [`ExecutionReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Failed,
    /// Never started because an upstream task failed under fail-fast.
    Skipped,
    /// Not finished when the run deadline expired.
    TimedOut,
}

/// When a task that actually ran started and finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub started: Instant,
    pub finished: Instant,
}

impl TaskTiming {
    pub fn duration(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }
}

/// Outcome of one `Scheduler::run`.
///
/// The four status collections are disjoint and together cover every task of
/// the graph.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub completed: BTreeSet<TaskId>,
    pub failed: BTreeMap<TaskId, TaskExecutionError>,
    pub skipped: BTreeSet<TaskId>,
    pub timed_out: BTreeSet<TaskId>,
    pub timings: BTreeMap<TaskId, TaskTiming>,
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// `true` if every task completed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.timed_out.is_empty()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.skipped.len() + self.timed_out.len()
    }

    pub fn status_of(&self, task: &str) -> Option<TaskStatus> {
        if self.completed.contains(task) {
            Some(TaskStatus::Completed)
        } else if self.failed.contains_key(task) {
            Some(TaskStatus::Failed)
        } else if self.skipped.contains(task) {
            Some(TaskStatus::Skipped)
        } else if self.timed_out.contains(task) {
            Some(TaskStatus::TimedOut)
        } else {
            None
        }
    }

    /// Every task that did not complete. Feed this to
    /// [`TaskGraph::subgraph_from`](crate::dag::TaskGraph::subgraph_from) to
    /// build a retry graph.
    pub fn unfinished(&self) -> BTreeSet<TaskId> {
        self.failed
            .keys()
            .chain(self.skipped.iter())
            .chain(self.timed_out.iter())
            .cloned()
            .collect()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} completed, {} failed, {} skipped, {} timed out in {:.2?}",
            self.completed.len(),
            self.failed.len(),
            self.skipped.len(),
            self.timed_out.len(),
            self.elapsed
        )
    }
}
