// src/lib.rs

//! Dependency-aware concurrent task scheduler.
//!
//! Build a [`TaskGraph`](dag::TaskGraph) of tasks and their prerequisites,
//! then hand it to a [`Scheduler`](engine::Scheduler), which runs it on a
//! bounded pool of workers and returns an
//! [`ExecutionReport`](engine::ExecutionReport).
//!
//! ```no_run
//! use taskdag::dag::{TaskGraph, action};
//! use taskdag::engine::{Scheduler, SchedulerConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut graph = TaskGraph::new();
//! graph.add_task("fetch", action(|_ctx| async { Ok(()) }), Vec::<String>::new())?;
//! graph.add_task("build", action(|_ctx| async { Ok(()) }), ["fetch"])?;
//!
//! let report = Scheduler::new(SchedulerConfig::default().with_pool_size(4))
//!     .run(&graph)
//!     .await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::model::deadline_from_secs;
use crate::config::{ConfigFile, load_and_validate};
use crate::engine::{Scheduler, SchedulerConfig, TracingObserver};
use crate::types::FailurePolicy;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the graph file, applies CLI overrides, then either
/// prints the plan (`--dry-run`) or runs it to completion.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let graph = cfg.build_graph()?;

    if args.dry_run {
        print_dry_run(&cfg, &graph)?;
        return Ok(());
    }

    let scheduler_cfg = apply_overrides(cfg.scheduler_config(), &args);
    let scheduler =
        Scheduler::new(scheduler_cfg).with_observer(std::sync::Arc::new(TracingObserver));
    let report = scheduler.run(&graph).await?;

    info!(summary = %report.summary(), "taskdag finished");
    for (task, timing) in &report.timings {
        debug!(task = %task, duration = ?timing.duration(), "task timing");
    }
    for (task, err) in &report.failed {
        eprintln!("task '{task}' failed: {err}");
    }
    for task in &report.skipped {
        eprintln!("task '{task}' skipped after upstream failure");
    }
    for task in &report.timed_out {
        eprintln!("task '{task}' did not finish before the deadline");
    }

    if !report.is_success() {
        bail!("{}", report.summary());
    }
    Ok(())
}

fn apply_overrides(mut cfg: SchedulerConfig, args: &CliArgs) -> SchedulerConfig {
    if let Some(jobs) = args.jobs {
        cfg = cfg.with_pool_size(jobs);
    }
    if args.fail_fast {
        cfg = cfg.with_failure_policy(FailurePolicy::FailFast);
    }
    if let Some(secs) = args.deadline {
        match deadline_from_secs(secs) {
            Some(deadline) => cfg = cfg.with_deadline(deadline),
            None => warn!(secs, "ignoring --deadline: not a usable number of seconds"),
        }
    }
    cfg
}

/// Simple dry-run output: scheduler settings, then tasks level by level.
fn print_dry_run(cfg: &ConfigFile, graph: &dag::TaskGraph) -> Result<()> {
    let groups = graph.parallelism_groups()?;

    println!("taskdag dry-run");
    println!("  scheduler.pool_size = {:?}", cfg.scheduler.pool_size);
    println!("  scheduler.failure_policy = {:?}", cfg.scheduler.failure_policy);
    println!("  scheduler.deadline_secs = {:?}", cfg.scheduler.deadline_secs);
    println!();

    println!("groups ({}):", groups.len());
    for (level, group) in groups.iter().enumerate() {
        println!("  [{level}]");
        for name in group {
            let task = &cfg.task[name];
            println!("    - {name}: {}", task.cmd);
            if !task.after.is_empty() {
                println!("        after: {:?}", task.after);
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
