// tests/config_loading.rs

mod common;
use crate::common::init_tracing;

use std::fs;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use taskdag::config::{ConfigFile, load_and_validate, load_from_path};
use taskdag::errors::{GraphError, TaskdagError};
use taskdag::types::FailurePolicy;
use taskdag_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("Taskdag.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn parses_scheduler_section_and_tasks() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        r#"
[scheduler]
pool_size = 3
failure_policy = "fail_fast"
deadline_secs = 2.5

[task.build]
cmd = "echo build"

[task.test]
cmd = "echo test"
after = ["build"]
"#,
    );

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.task.len(), 2);
    assert_eq!(cfg.task["test"].after, vec!["build".to_string()]);

    let sched = cfg.scheduler_config();
    assert_eq!(sched.pool_size, 3);
    assert_eq!(sched.failure_policy, FailurePolicy::FailFast);
    assert_eq!(sched.deadline, Some(Duration::from_millis(2500)));

    let graph = cfg.build_graph()?;
    assert_eq!(graph.topological_order()?, vec!["build", "test"]);
    Ok(())
}

#[test]
fn scheduler_section_is_optional() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(&dir, "[task.only]\ncmd = \"true\"\n");

    let cfg = load_and_validate(&path)?;
    let sched = cfg.scheduler_config();
    assert_eq!(sched.failure_policy, FailurePolicy::BestEffort);
    assert!(sched.deadline.is_none());
    assert!(sched.pool_size >= 1);
    Ok(())
}

#[test]
fn forward_references_in_after_are_fine() -> Result<()> {
    // "a" sorts before "z" but depends on it.
    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").after("z").build())
        .with_task("z", TaskConfigBuilder::new("true").build())
        .build();

    assert_eq!(cfg.build_graph()?.topological_order()?, vec!["z", "a"]);
    Ok(())
}

#[test]
fn cycle_in_config_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        r#"
[task.x]
cmd = "true"
after = ["y"]

[task.y]
cmd = "true"
after = ["x"]
"#,
    );

    let err = load_and_validate(&path).unwrap_err();
    assert!(
        matches!(err, TaskdagError::Graph(GraphError::Cycle { .. })),
        "unexpected error: {err}"
    );
    Ok(())
}

#[test]
fn unknown_dependency_is_a_config_error() {
    let raw = ConfigFileBuilder::new()
        .with_task("deploy", TaskConfigBuilder::new("true").after("ghost").build())
        .build_raw();

    match ConfigFile::try_from(raw) {
        Err(TaskdagError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"), "{msg}");
            assert!(msg.contains("ghost"), "{msg}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn rejects_zero_pool_size_and_bad_deadline() {
    let task = || TaskConfigBuilder::new("true").build();

    let zero_pool = ConfigFileBuilder::new()
        .with_task("t", task())
        .with_pool_size(0)
        .build_raw();
    assert!(matches!(
        ConfigFile::try_from(zero_pool),
        Err(TaskdagError::ConfigError(_))
    ));

    let negative_deadline = ConfigFileBuilder::new()
        .with_task("t", task())
        .with_deadline_secs(-1.0)
        .build_raw();
    assert!(matches!(
        ConfigFile::try_from(negative_deadline),
        Err(TaskdagError::ConfigError(_))
    ));
}

#[test]
fn empty_config_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(&dir, "[scheduler]\npool_size = 2\n");

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, TaskdagError::ConfigError(_)));
    Ok(())
}

#[test]
fn unknown_failure_policy_fails_to_parse() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        "[scheduler]\nfailure_policy = \"yolo\"\n\n[task.t]\ncmd = \"true\"\n",
    );

    assert!(matches!(
        load_from_path(&path),
        Err(TaskdagError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_from_path(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, TaskdagError::IoError(_)));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shell_commands_run_in_dependency_order() -> Result<()> {
    init_tracing();

    let dir = TempDir::new()?;
    let out = dir.path().join("out.txt");
    let out_str = out.display().to_string();

    let cfg = ConfigFileBuilder::new()
        .with_task("first", TaskConfigBuilder::new(&format!("echo first >> '{out_str}'")).build())
        .with_task(
            "second",
            TaskConfigBuilder::new(&format!("echo second >> '{out_str}'"))
                .after("first")
                .build(),
        )
        .with_task("broken", TaskConfigBuilder::new("exit 7").build())
        .build();

    let graph = cfg.build_graph()?;
    let report = taskdag::engine::Scheduler::new(cfg.scheduler_config())
        .run(&graph)
        .await?;

    assert_eq!(fs::read_to_string(&out)?, "first\nsecond\n");
    assert!(report.completed.contains("first"));
    assert!(report.completed.contains("second"));
    let err = report.failed["broken"].to_string();
    assert!(err.contains("exited with status"), "{err}");
    Ok(())
}

#[test]
fn parse_str_reads_in_memory_config() {
    let raw = taskdag::config::parse_str(
        "[scheduler]\nfailure_policy = \"best_effort\"\n\n[task.a]\ncmd = \"true\"\n",
    )
    .unwrap();
    assert_eq!(raw.scheduler.failure_policy, FailurePolicy::BestEffort);
    assert!(raw.scheduler.pool_size.is_none());

    // serde only knows the snake_case spelling; `FromStr` is more lenient.
    assert!(taskdag::config::parse_str("[scheduler]\nfailure_policy = \"fail-fast\"\n").is_err());
    assert_eq!("fail-fast".parse::<FailurePolicy>().unwrap(), FailurePolicy::FailFast);
}

#[test]
fn deadline_too_large_for_a_duration_is_rejected() {
    let raw = taskdag::config::parse_str(
        "[scheduler]\ndeadline_secs = 1e300\n\n[task.a]\ncmd = \"true\"\n",
    )
    .unwrap();

    match ConfigFile::try_from(raw) {
        Err(TaskdagError::ConfigError(msg)) => assert!(msg.contains("deadline_secs"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}
