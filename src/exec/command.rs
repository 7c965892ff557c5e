// src/exec/command.rs

//! Shell command task actions.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::dag::task::{TaskContext, TaskFn, action};

/// Build a task action that runs `cmd` through the platform shell.
///
/// - stdout lines are echoed to our stdout, prefixed with the task id
/// - stderr lines are logged at debug
/// - a non-zero exit status fails the task
/// - if the run's cancel signal fires, the child is killed and the task
///   fails as cancelled
pub fn command_action(cmd: impl Into<String>) -> TaskFn {
    let cmd: String = cmd.into();
    action(move |ctx| {
        let cmd = cmd.clone();
        async move { run_command(&ctx, &cmd).await }
    })
}

async fn run_command(ctx: &TaskContext, cmd: &str) -> Result<()> {
    let task = ctx.task_id();
    info!(task = %task, cmd = %cmd, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{task}'"))?;

    if let Some(stdout) = child.stdout.take() {
        let task_name = task.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                println!("[{task_name}] {line}");
            }
        });
    }

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let task_name = task.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .with_context(|| format!("waiting for process of task '{task}'"))?;
            let code = status.code().unwrap_or(-1);

            info!(
                task = %task,
                exit_code = code,
                success = status.success(),
                "task process exited"
            );

            if !status.success() {
                bail!("command `{cmd}` exited with status {code}");
            }
            Ok(())
        }

        _ = ctx.cancel_signal().cancelled() => {
            info!(task = %task, "cancellation requested; killing process");
            if let Err(e) = child.kill().await {
                warn!(task = %task, error = %e, "failed to kill child process on cancellation");
            }
            bail!("command `{cmd}` cancelled")
        }
    }
}
