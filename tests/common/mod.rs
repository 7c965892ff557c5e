#![allow(dead_code)]

pub use taskdag_test_utils::{actions, init_tracing, recorder, with_timeout};

use std::sync::Arc;

use taskdag::dag::{TaskFn, TaskGraph};
use taskdag::engine::{Scheduler, SchedulerConfig, SchedulerObserver};
use taskdag_test_utils::recorder::RecordingObserver;

/// A (no deps), B and C depend on A, D depends on B and C.
pub fn diamond(mut action_for: impl FnMut(&str) -> TaskFn) -> TaskGraph {
    let mut g = TaskGraph::new();
    g.add_task("A", action_for("A"), Vec::<String>::new()).unwrap();
    g.add_task("B", action_for("B"), ["A"]).unwrap();
    g.add_task("C", action_for("C"), ["A"]).unwrap();
    g.add_task("D", action_for("D"), ["B", "C"]).unwrap();
    g
}

/// Scheduler wired to a fresh recording observer.
pub fn recorded_scheduler(config: SchedulerConfig) -> (Scheduler, Arc<RecordingObserver>) {
    let recorder = Arc::new(RecordingObserver::new());
    let observer: Arc<dyn SchedulerObserver> = recorder.clone();
    (Scheduler::new(config).with_observer(observer), recorder)
}
