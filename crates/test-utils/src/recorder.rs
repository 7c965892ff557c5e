//! Observer that records every transition for later assertions.

use std::sync::Mutex;
use std::time::Instant;

use taskdag::engine::{ExecutionReport, SchedulerObserver, Transition};

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub task: String,
    pub transition: Transition,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RecordedEvent>>,
    finished_runs: Mutex<usize>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// How many times `task` went through `transition`.
    pub fn count(&self, task: &str, transition: Transition) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.task == task && e.transition == transition)
            .count()
    }

    /// Transitions of a single task, in the order they were observed.
    pub fn transitions_of(&self, task: &str) -> Vec<Transition> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.task == task)
            .map(|e| e.transition)
            .collect()
    }

    /// Tasks in the order they started running.
    pub fn start_order(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.transition == Transition::Running)
            .map(|e| e.task.clone())
            .collect()
    }

    pub fn finished_runs(&self) -> usize {
        *self.finished_runs.lock().unwrap()
    }
}

impl SchedulerObserver for RecordingObserver {
    fn on_transition(&self, task: &str, transition: Transition) {
        self.events.lock().unwrap().push(RecordedEvent {
            task: task.to_string(),
            transition,
            at: Instant::now(),
        });
    }

    fn on_run_finished(&self, _report: &ExecutionReport) {
        *self.finished_runs.lock().unwrap() += 1;
    }
}
