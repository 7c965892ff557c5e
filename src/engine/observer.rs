// src/engine/observer.rs

//! Progress hooks injected into the scheduler.
//!
//! Callbacks run synchronously on whichever worker caused the transition,
//! never while the scheduler's counter lock is held. Calls from different
//! workers interleave; there is no global order.

use std::fmt;

use tracing::{debug, info};

use crate::engine::report::ExecutionReport;
use crate::engine::Transition;

pub trait SchedulerObserver: Send + Sync {
    fn on_transition(&self, task: &str, transition: Transition);

    fn on_run_finished(&self, _report: &ExecutionReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SchedulerObserver for NoopObserver {
    fn on_transition(&self, _task: &str, _transition: Transition) {}
}

/// Observer that emits one `tracing` event per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SchedulerObserver for TracingObserver {
    fn on_transition(&self, task: &str, transition: Transition) {
        debug!(task = %task, transition = transition.name(), "task transition");
    }

    fn on_run_finished(&self, report: &ExecutionReport) {
        info!(summary = %report.summary(), "run finished");
    }
}

/// Adapts a closure into an observer, for plain progress callbacks.
pub struct FnObserver<F>(pub F);

impl<F> SchedulerObserver for FnObserver<F>
where
    F: Fn(&str, Transition) + Send + Sync,
{
    fn on_transition(&self, task: &str, transition: Transition) {
        (self.0)(task, transition)
    }
}

impl<F> fmt::Debug for FnObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver").finish_non_exhaustive()
    }
}
