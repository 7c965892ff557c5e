// src/engine/scheduler.rs

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dag::TaskGraph;
use crate::engine::observer::{NoopObserver, SchedulerObserver};
use crate::engine::report::ExecutionReport;
use crate::engine::worker::RunShared;
use crate::errors::SchedulerError;
use crate::types::FailurePolicy;

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of workers. Clamped to at least 1 and at most the task count.
    pub pool_size: usize,
    pub failure_policy: FailurePolicy,
    /// Optional wall-clock limit for the whole run.
    pub deadline: Option<Duration>,
    /// How long an idle worker waits on the ready queue before re-checking
    /// the run for a stall.
    pub idle_check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            failure_policy: FailurePolicy::default(),
            deadline: None,
            idle_check_interval: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn fail_fast(self) -> Self {
        self.with_failure_policy(FailurePolicy::FailFast)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_idle_check_interval(mut self, interval: Duration) -> Self {
        self.idle_check_interval = interval;
        self
    }
}

/// Runs a [`TaskGraph`] on a fixed-size pool of workers.
///
/// A scheduler is consumed by [`run`](Self::run): every run gets fresh
/// counters, a fresh ready queue and fresh workers.
pub struct Scheduler {
    config: SchedulerConfig,
    observer: Arc<dyn SchedulerObserver>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SchedulerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Execute every task of `graph` and report the outcome.
    ///
    /// Steps:
    /// 1. validate the graph (unresolved references, cycles)
    /// 2. seed the ready queue with tasks that have no prerequisites
    /// 3. spawn the workers and wait until every task is terminal or the
    ///    deadline expires
    ///
    /// Task failures never surface here; they are in the report. Only an
    /// invalid graph, a deadlock or a crashed worker return `Err`.
    pub async fn run(self, graph: &TaskGraph) -> Result<ExecutionReport, SchedulerError> {
        let started = Instant::now();
        graph.validate()?;

        let entries = graph.arena_entries();
        if entries.is_empty() {
            info!("empty task graph; nothing to run");
            let report = ExecutionReport::default();
            self.observer.on_run_finished(&report);
            return Ok(report);
        }

        let tasks = entries.len();
        let pool_size = self.config.pool_size.clamp(1, tasks);
        info!(
            tasks,
            pool_size,
            policy = ?self.config.failure_policy,
            deadline = ?self.config.deadline,
            "starting run"
        );

        let shared = Arc::new(RunShared::new(
            entries,
            self.config.failure_policy,
            self.config.idle_check_interval,
            Arc::clone(&self.observer),
        ));
        shared.seed();

        let workers: Vec<JoinHandle<()>> = (0..pool_size)
            .map(|w| tokio::spawn(Arc::clone(&shared).worker_loop(w)))
            .collect();

        let expired = match self.config.deadline {
            Some(limit) => {
                tokio::select! {
                    _ = shared.wait_finished() => false,
                    _ = tokio::time::sleep(limit) => shared.expire(),
                }
            }
            None => {
                shared.wait_finished().await;
                false
            }
        };

        if expired {
            // Running actions are not interrupted; their workers are detached
            // and exit once the action returns.
            warn!("returning partial report; running tasks left to finish on their own");
        } else {
            for worker in workers {
                worker
                    .await
                    .map_err(|e| SchedulerError::WorkerPanicked(e.to_string()))?;
            }
        }

        let report = shared.take_report(started.elapsed())?;
        self.observer.on_run_finished(&report);
        Ok(report)
    }
}
