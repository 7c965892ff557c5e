//! Stock task actions for tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskdag::dag::{TaskFn, action};

/// Succeeds immediately.
pub fn ok() -> TaskFn {
    action(|_ctx| async { Ok(()) })
}

/// Fails immediately with `msg`.
pub fn failing(msg: &'static str) -> TaskFn {
    action(move |_ctx| async move { Err(anyhow::anyhow!(msg)) })
}

/// Panics when run.
pub fn panicking(msg: &'static str) -> TaskFn {
    action(move |_ctx| boom(msg))
}

async fn boom(msg: &'static str) -> anyhow::Result<()> {
    panic!("{msg}")
}

/// Sleeps for `ms` milliseconds, then succeeds.
pub fn sleeping(ms: u64) -> TaskFn {
    action(move |_ctx| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    })
}

/// Sleeps for `ms` milliseconds unless cancelled first; fails if cancelled.
pub fn cancellable_sleep(ms: u64) -> TaskFn {
    action(move |ctx| async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
            _ = ctx.cancel_signal().cancelled() => Err(anyhow::anyhow!("cancelled")),
        }
    })
}

/// Appends the task id to `log` when run, then succeeds.
pub fn recording(log: Arc<Mutex<Vec<String>>>) -> TaskFn {
    action(move |ctx| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(ctx.task_id().to_string());
            Ok(())
        }
    })
}
