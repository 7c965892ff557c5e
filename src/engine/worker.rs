// src/engine/worker.rs

//! Shared per-run state and the worker loop.
//!
//! All bookkeeping (remaining-prerequisite counters, task states, the count
//! of queued + running tasks, results) lives behind a single mutex. The
//! decrement-compare-push sequence for dependents happens inside that one
//! critical section, so a task whose prerequisites finish simultaneously on
//! different workers is still enqueued exactly once. The lock is never held
//! across an await.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::dag::graph::ArenaEntry;
use crate::dag::task::{CancelHandle, TaskContext, TaskFn};
use crate::engine::observer::SchedulerObserver;
use crate::engine::queue::{Pop, ReadyQueue};
use crate::engine::report::{ExecutionReport, TaskTiming};
use crate::engine::{TaskState, Transition};
use crate::errors::{SchedulerError, TaskExecutionError};
use crate::types::{FailurePolicy, TaskId};

/// Why a run stopped starting new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    FailFast,
    Deadline,
}

/// Mutable bookkeeping for one run.
#[derive(Debug)]
struct Counters {
    remaining: Vec<usize>,
    states: Vec<TaskState>,
    /// Tasks currently `Ready` or `Running`.
    in_flight: usize,
    /// Tasks in a terminal state.
    resolved: usize,
    halted: Option<Halt>,
    finished: bool,
    deadlocked: bool,
    failures: BTreeMap<usize, TaskExecutionError>,
    started_at: Vec<Option<Instant>>,
    finished_at: Vec<Option<Instant>>,
}

type Events = Vec<(usize, Transition)>;

/// Everything the workers of one run share.
pub(crate) struct RunShared {
    ids: Vec<TaskId>,
    actions: Vec<TaskFn>,
    dependents: Vec<Vec<usize>>,
    counters: Mutex<Counters>,
    queue: ReadyQueue<usize>,
    done: Notify,
    cancel: CancelHandle,
    observer: Arc<dyn SchedulerObserver>,
    policy: FailurePolicy,
    idle_check: Duration,
}

impl RunShared {
    pub(crate) fn new(
        entries: Vec<ArenaEntry>,
        policy: FailurePolicy,
        idle_check: Duration,
        observer: Arc<dyn SchedulerObserver>,
    ) -> Self {
        let n = entries.len();
        let mut ids = Vec::with_capacity(n);
        let mut actions = Vec::with_capacity(n);
        let mut dependents = Vec::with_capacity(n);
        let mut remaining = Vec::with_capacity(n);
        for entry in entries {
            ids.push(entry.id);
            actions.push(entry.action);
            dependents.push(entry.dependents);
            remaining.push(entry.prerequisites);
        }

        Self {
            ids,
            actions,
            dependents,
            counters: Mutex::new(Counters {
                remaining,
                states: vec![TaskState::Pending; n],
                in_flight: 0,
                resolved: 0,
                halted: None,
                finished: false,
                deadlocked: false,
                failures: BTreeMap::new(),
                started_at: vec![None; n],
                finished_at: vec![None; n],
            }),
            queue: ReadyQueue::new(),
            done: Notify::new(),
            cancel: CancelHandle::new(),
            observer,
            policy,
            idle_check,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Poisoning would need a panic inside our own critical sections; task
        // actions never run under the lock.
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push every task without prerequisites. Returns how many were seeded.
    pub(crate) fn seed(&self) -> usize {
        let mut events = Events::new();
        let finished = {
            let mut c = self.lock();
            for idx in 0..self.ids.len() {
                if c.remaining[idx] == 0 && self.queue.push(idx) {
                    c.states[idx] = TaskState::Ready;
                    c.in_flight += 1;
                    events.push((idx, Transition::Ready));
                }
            }
            self.check_finish(&mut c, &mut events)
        };

        let seeded = events
            .iter()
            .filter(|(_, t)| *t == Transition::Ready)
            .count();
        debug!(seeded, "seeded ready queue with root tasks");
        self.emit(&events);
        if finished {
            self.done.notify_one();
        }
        seeded
    }

    /// Worker main loop: pop, run, release dependents, repeat until the queue
    /// is closed.
    pub(crate) async fn worker_loop(self: Arc<Self>, worker: usize) {
        debug!(worker, "worker started");
        loop {
            match self.queue.pop_timeout(self.idle_check).await {
                Pop::Item(idx) => self.process(idx).await,
                Pop::Empty => self.check_stalled(),
                Pop::Closed => break,
            }
        }
        debug!(worker, "worker exiting (queue closed)");
    }

    async fn process(&self, idx: usize) {
        let mut events = Events::new();
        {
            let mut c = self.lock();
            if c.finished {
                return;
            }
            if c.halted.is_some() {
                c.states[idx] = TaskState::Skipped;
                c.in_flight -= 1;
                c.resolved += 1;
                events.push((idx, Transition::Skipped));
                let finished = self.check_finish(&mut c, &mut events);
                drop(c);
                debug!(task = %self.ids[idx], "run halted; skipping dequeued task");
                self.emit(&events);
                if finished {
                    self.done.notify_one();
                }
                return;
            }
            c.states[idx] = TaskState::Running;
            c.started_at[idx] = Some(Instant::now());
        }

        debug!(task = %self.ids[idx], "task running");
        self.observer.on_transition(&self.ids[idx], Transition::Running);

        let outcome = self.execute(idx).await;
        self.complete(idx, outcome);
    }

    /// Run the action on its own tokio task so a panic is contained and
    /// reported instead of taking the worker down.
    async fn execute(&self, idx: usize) -> Result<(), TaskExecutionError> {
        let action = Arc::clone(&self.actions[idx]);
        let ctx = TaskContext::new(self.ids[idx].clone(), self.cancel.signal());

        match tokio::spawn(async move { action(ctx).await }).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TaskExecutionError::Failed(err)),
            Err(join) if join.is_panic() => Err(TaskExecutionError::Panicked(panic_message(
                join.into_panic(),
            ))),
            Err(join) => Err(TaskExecutionError::Aborted(join.to_string())),
        }
    }

    /// Record an outcome and release dependents, all in one critical section.
    fn complete(&self, idx: usize, outcome: Result<(), TaskExecutionError>) {
        let mut events = Events::new();
        let finished = {
            let mut c = self.lock();
            if c.finished {
                debug!(task = %self.ids[idx], "task finished after run ended; result dropped");
                return;
            }

            c.finished_at[idx] = Some(Instant::now());
            c.in_flight -= 1;
            c.resolved += 1;

            match outcome {
                Ok(()) => {
                    c.states[idx] = TaskState::Completed;
                    events.push((idx, Transition::Completed));
                    debug!(task = %self.ids[idx], "task completed");
                }
                Err(err) => {
                    warn!(task = %self.ids[idx], error = %err, "task failed");
                    c.states[idx] = TaskState::Failed;
                    c.failures.insert(idx, err);
                    events.push((idx, Transition::Failed));

                    if self.policy == FailurePolicy::FailFast && c.halted.is_none() {
                        warn!(
                            task = %self.ids[idx],
                            "fail-fast: no further tasks will be started"
                        );
                        // Running siblings are left alone and drain normally.
                        c.halted = Some(Halt::FailFast);
                    }
                }
            }

            for &dep in &self.dependents[idx] {
                c.remaining[dep] -= 1;
                if c.remaining[dep] == 0
                    && c.halted.is_none()
                    && c.states[dep] == TaskState::Pending
                    && self.queue.push(dep)
                {
                    c.states[dep] = TaskState::Ready;
                    c.in_flight += 1;
                    events.push((dep, Transition::Ready));
                }
            }

            self.check_finish(&mut c, &mut events)
        };

        self.emit(&events);
        if finished {
            self.done.notify_one();
        }
    }

    /// Decide whether the run is over. Must be called with the lock held.
    ///
    /// The run is over when every task is terminal, or when nothing is queued
    /// or running any more. The latter is expected after a fail-fast halt
    /// (leftovers become `Skipped`) and is a deadlock otherwise.
    fn check_finish(&self, c: &mut Counters, events: &mut Events) -> bool {
        if c.finished {
            return false;
        }

        if c.resolved == self.ids.len() {
            c.finished = true;
        } else if c.in_flight == 0 {
            if c.halted.is_some() {
                for idx in 0..self.ids.len() {
                    if !c.states[idx].is_terminal() {
                        c.states[idx] = TaskState::Skipped;
                        c.resolved += 1;
                        events.push((idx, Transition::Skipped));
                    }
                }
            } else {
                error!(
                    unresolved = self.ids.len() - c.resolved,
                    "ready queue drained with unresolved tasks and nothing running"
                );
                c.deadlocked = true;
            }
            c.finished = true;
        }

        if c.finished {
            self.queue.close();
        }
        c.finished
    }

    /// Called by idle workers whenever their bounded wait elapses.
    fn check_stalled(&self) {
        let mut events = Events::new();
        let finished = {
            let mut c = self.lock();
            c.in_flight == 0 && self.check_finish(&mut c, &mut events)
        };
        self.emit(&events);
        if finished {
            self.done.notify_one();
        }
    }

    /// Deadline expiry: freeze the run and mark every unfinished task.
    ///
    /// Returns `false` if the run had already finished on its own.
    pub(crate) fn expire(&self) -> bool {
        let mut events = Events::new();
        {
            let mut c = self.lock();
            if c.finished {
                return false;
            }
            c.halted = Some(Halt::Deadline);
            for idx in 0..self.ids.len() {
                if !c.states[idx].is_terminal() {
                    c.states[idx] = TaskState::TimedOut;
                    c.resolved += 1;
                    events.push((idx, Transition::TimedOut));
                }
            }
            c.finished = true;
            self.queue.close();
        }
        self.cancel.cancel();
        warn!(timed_out = events.len(), "run deadline expired");
        self.emit(&events);
        true
    }

    pub(crate) async fn wait_finished(&self) {
        self.done.notified().await;
    }

    /// Build the report from the frozen state.
    pub(crate) fn take_report(&self, elapsed: Duration) -> Result<ExecutionReport, SchedulerError> {
        let mut c = self.lock();

        if c.deadlocked {
            let unresolved = (0..self.ids.len())
                .filter(|&idx| !c.states[idx].is_terminal())
                .map(|idx| self.ids[idx].clone())
                .collect();
            return Err(SchedulerError::Deadlock { unresolved });
        }

        let mut failures = std::mem::take(&mut c.failures);
        let mut report = ExecutionReport {
            elapsed,
            ..ExecutionReport::default()
        };

        for (idx, id) in self.ids.iter().enumerate() {
            match c.states[idx] {
                TaskState::Completed => {
                    report.completed.insert(id.clone());
                }
                TaskState::Failed => {
                    let err = failures.remove(&idx).unwrap_or_else(|| {
                        TaskExecutionError::Aborted("failure recorded without an error".into())
                    });
                    report.failed.insert(id.clone(), err);
                }
                TaskState::Skipped => {
                    report.skipped.insert(id.clone());
                }
                TaskState::TimedOut => {
                    report.timed_out.insert(id.clone());
                }
                TaskState::Pending | TaskState::Ready | TaskState::Running => {
                    warn!(task = %id, state = ?c.states[idx], "non-terminal task at end of run");
                    report.timed_out.insert(id.clone());
                }
            }

            if let (Some(started), Some(finished)) = (c.started_at[idx], c.finished_at[idx]) {
                report
                    .timings
                    .insert(id.clone(), TaskTiming { started, finished });
            }
        }

        info!(summary = %report.summary(), "run finished");
        Ok(report)
    }

    fn emit(&self, events: &[(usize, Transition)]) {
        for &(idx, transition) in events {
            self.observer.on_transition(&self.ids[idx], transition);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
