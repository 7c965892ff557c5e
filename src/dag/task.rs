// src/dag/task.rs

//! Task actions and the context the scheduler hands to them.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

use crate::types::TaskId;

/// Future returned by a task action.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A task's action. The scheduler calls it exactly once per run and never
/// looks at what it does.
pub type TaskFn = Arc<dyn Fn(TaskContext) -> TaskFuture + Send + Sync>;

/// Wrap an async closure as a [`TaskFn`].
pub fn action<F, Fut>(f: F) -> TaskFn
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Wrap a synchronous closure as a [`TaskFn`].
///
/// The closure runs on tokio's blocking pool, so CPU-bound or blocking IO
/// work does not stall the worker threads. A panic inside the closure is
/// re-raised on the task so the scheduler records it as such.
pub fn blocking_action<F>(f: F) -> TaskFn
where
    F: Fn(TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |ctx| {
        let f = Arc::clone(&f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(ctx)).await {
                Ok(res) => res,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => Err(anyhow::Error::new(e).context("blocking task was cancelled")),
            }
        })
    })
}

/// Cooperative cancellation signal.
///
/// Raised by the scheduler when the run deadline expires. A fail-fast halt
/// does not raise it; running tasks are left to finish.
/// Running actions are never interrupted; it is up to them to check
/// [`is_cancelled`](Self::is_cancelled) or await [`cancelled`](Self::cancelled).
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested.
    ///
    /// If the owning scheduler goes away without cancelling, this never
    /// resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Owning side of a [`CancelSignal`].
#[derive(Debug)]
pub(crate) struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub(crate) fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Returns `true` if this call raised the signal.
    pub(crate) fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }
}

/// Minimal execution context injected into every action.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: TaskId,
    cancel: CancelSignal,
}

impl TaskContext {
    pub fn new(task_id: impl Into<TaskId>, cancel: CancelSignal) -> Self {
        Self {
            task_id: task_id.into(),
            cancel,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
