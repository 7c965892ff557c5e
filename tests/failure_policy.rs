// tests/failure_policy.rs

mod common;
use crate::common::{actions, init_tracing, recorded_scheduler, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use taskdag::dag::{TaskFn, TaskGraph, action};
use taskdag::engine::{SchedulerConfig, TaskStatus, Transition};

type TestResult = Result<(), Box<dyn Error>>;

/// Fails after `ms` milliseconds, giving sibling tasks time to start.
fn failing_after(ms: u64) -> TaskFn {
    action(move |_ctx| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        anyhow::bail!("failed after {ms}ms")
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fail_fast_never_starts_dependents() -> TestResult {
    init_tracing();

    let mut graph = TaskGraph::new();
    graph.add_task("A", actions::failing("boom"), Vec::<String>::new())?;
    graph.add_task("B", actions::ok(), ["A"])?;
    graph.add_task("C", actions::ok(), ["B"])?;

    let (scheduler, recorder) = recorded_scheduler(SchedulerConfig::default().fail_fast());
    let report = with_timeout(scheduler.run(&graph)).await?;

    assert_eq!(report.status_of("A"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("B"), Some(TaskStatus::Skipped));
    assert_eq!(report.status_of("C"), Some(TaskStatus::Skipped));
    assert_eq!(recorder.count("B", Transition::Running), 0);
    assert_eq!(recorder.count("C", Transition::Running), 0);
    assert_eq!(recorder.transitions_of("B"), vec![Transition::Skipped]);
    assert!(!report.is_success());
    assert_eq!(report.total(), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fail_fast_skips_tasks_already_queued() -> TestResult {
    init_tracing();

    // Single worker: A is popped first, Z waits in the queue behind it.
    let mut graph = TaskGraph::new();
    graph.add_task("A", actions::failing("boom"), Vec::<String>::new())?;
    graph.add_task("Z", actions::ok(), Vec::<String>::new())?;

    let (scheduler, recorder) =
        recorded_scheduler(SchedulerConfig::default().fail_fast().with_pool_size(1));
    let report = with_timeout(scheduler.run(&graph)).await?;

    assert_eq!(report.status_of("Z"), Some(TaskStatus::Skipped));
    assert_eq!(recorder.count("Z", Transition::Ready), 1);
    assert_eq!(recorder.count("Z", Transition::Running), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fail_fast_drains_running_tasks_without_cancelling_them() -> TestResult {
    init_tracing();

    let saw_cancel = Arc::new(AtomicBool::new(false));
    let watcher = {
        let saw_cancel = Arc::clone(&saw_cancel);
        action(move |ctx| {
            let saw_cancel = Arc::clone(&saw_cancel);
            async move {
                // Outlives A's failure by a wide margin.
                let signal = ctx.cancel_signal();
                if tokio::time::timeout(Duration::from_millis(300), signal.cancelled())
                    .await
                    .is_ok()
                {
                    saw_cancel.store(true, Ordering::SeqCst);
                }
                Ok(())
            }
        })
    };

    let mut graph = TaskGraph::new();
    graph.add_task("A", failing_after(50), Vec::<String>::new())?;
    graph.add_task("watcher", watcher, Vec::<String>::new())?;
    graph.add_task("B", actions::ok(), ["A"])?;

    let (scheduler, _recorder) =
        recorded_scheduler(SchedulerConfig::default().fail_fast().with_pool_size(2));
    let report = with_timeout(scheduler.run(&graph)).await?;

    assert!(!saw_cancel.load(Ordering::SeqCst), "fail-fast must not cancel running tasks");
    assert_eq!(report.status_of("watcher"), Some(TaskStatus::Completed));
    assert_eq!(report.status_of("A"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("B"), Some(TaskStatus::Skipped));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn running_sibling_keeps_its_own_outcome_under_fail_fast() -> TestResult {
    init_tracing();

    let mut graph = TaskGraph::new();
    graph.add_task("A", failing_after(50), Vec::<String>::new())?;
    graph.add_task("sibling", actions::cancellable_sleep(300), Vec::<String>::new())?;

    let report = with_timeout(
        taskdag::engine::Scheduler::new(SchedulerConfig::default().fail_fast().with_pool_size(2))
            .run(&graph),
    )
    .await?;

    assert_eq!(report.status_of("sibling"), Some(TaskStatus::Completed));
    assert_eq!(report.failed.keys().collect::<Vec<_>>(), vec!["A"]);
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fail_fast_does_not_kill_running_shell_commands() -> TestResult {
    use taskdag::exec::command_action;

    init_tracing();

    let mut graph = TaskGraph::new();
    graph.add_task("bad", command_action("sleep 0.1; exit 1"), Vec::<String>::new())?;
    graph.add_task("good", command_action("sleep 0.5"), Vec::<String>::new())?;

    let report = with_timeout(
        taskdag::engine::Scheduler::new(SchedulerConfig::default().fail_fast().with_pool_size(2))
            .run(&graph),
    )
    .await?;

    assert_eq!(report.status_of("bad"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("good"), Some(TaskStatus::Completed));
    assert!(!report.failed.contains_key("good"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn best_effort_runs_everything_despite_failures() -> TestResult {
    init_tracing();

    let mut graph = TaskGraph::new();
    graph.add_task("A", actions::failing("one"), Vec::<String>::new())?;
    graph.add_task("B", actions::failing("two"), ["A"])?;
    graph.add_task("C", actions::ok(), ["B"])?;
    graph.add_task("D", actions::ok(), Vec::<String>::new())?;

    let (scheduler, recorder) = recorded_scheduler(SchedulerConfig::default());
    let report = with_timeout(scheduler.run(&graph)).await?;

    assert_eq!(report.failed.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(report.status_of("C"), Some(TaskStatus::Completed));
    assert_eq!(report.status_of("D"), Some(TaskStatus::Completed));
    assert_eq!(recorder.start_order().len(), 4);
    Ok(())
}
