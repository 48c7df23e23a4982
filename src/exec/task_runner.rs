// src/exec/task_runner.rs

//! Individual task process runner.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};

/// Environment variable naming the task being run.
pub const ENV_TASK: &str = "RESTAGE_TASK";
/// Newline-separated paths of the files this run must process.
pub const ENV_FILES: &str = "RESTAGE_FILES";
/// `1` when `RESTAGE_FILES` holds only changed files, `0` for a full run.
pub const ENV_INCREMENTAL: &str = "RESTAGE_INCREMENTAL";

/// Run a single task process and report its outcome.
///
/// If the cancel channel fires, the child is killed and **no**
/// `TaskCompleted` event is sent for that instance.
pub async fn run_task(
    task: ScheduledTask,
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let task_name = task.name.clone();
    let run_id = task.run_id;
    if let Err(err) = run_task_inner(task, &runtime_tx, cancel_rx).await {
        error!(
            task = %task_name,
            run_id,
            error = %err,
            "task execution error"
        );
        let _ = runtime_tx.send(RuntimeEvent::TaskCompleted {
            task: task_name,
            outcome: TaskOutcome::Failed(-1),
        });
    }
}

/// Build the platform shell command for a task, with the narrowed file list
/// in its environment.
pub fn build_command(task: &ScheduledTask) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&task.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&task.cmd);
        c
    };

    let files = task
        .files
        .iter()
        .map(|f| f.path.to_string_lossy())
        .collect::<Vec<_>>()
        .join("\n");

    cmd.env(ENV_TASK, &task.name)
        .env(ENV_FILES, files)
        .env(ENV_INCREMENTAL, if task.incremental { "1" } else { "0" });
    cmd
}

async fn run_task_inner(
    task: ScheduledTask,
    runtime_tx: &mpsc::UnboundedSender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) -> Result<()> {
    info!(
        task = %task.name,
        run_id = task.run_id,
        incremental = task.incremental,
        files = task.files.len(),
        cmd = %task.cmd,
        "starting task process"
    );

    let mut cmd = build_command(&task);
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.name))?;

    if let Some(stdout) = child.stdout.take() {
        forward_lines(task.name.clone(), stdout, false);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(task.name.clone(), stderr, true);
    }

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of task '{}'", task.name)
            })?;

            let code = status.code().unwrap_or(-1);
            let outcome = if status.success() {
                TaskOutcome::Success
            } else {
                TaskOutcome::Failed(code)
            };

            info!(
                task = %task.name,
                run_id = task.run_id,
                exit_code = code,
                success = status.success(),
                "task process exited"
            );

            runtime_tx
                .send(RuntimeEvent::TaskCompleted {
                    task: task.name.clone(),
                    outcome,
                })
                .map_err(|_| anyhow::anyhow!("runtime channel closed"))
                .with_context(|| {
                    format!("sending TaskCompleted event for task '{}' to runtime", task.name)
                })?;
        }

        () = cancelled(cancel_rx) => {
            info!(
                task = %task.name,
                run_id = task.run_id,
                "cancellation requested; killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(
                    task = %task.name,
                    run_id = task.run_id,
                    error = %e,
                    "failed to kill child process on cancellation"
                );
            }
        }
    }

    Ok(())
}

/// Resolves only on an explicit cancel; a dropped sender never cancels.
async fn cancelled(cancel_rx: oneshot::Receiver<()>) {
    if cancel_rx.await.is_err() {
        debug!("cancel channel closed without explicit cancellation");
        std::future::pending::<()>().await;
    }
}

/// Log every line a task writes; stderr lines at warn level.
fn forward_lines<R>(task: String, reader: R, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                warn!(task = %task, "{}", line);
            } else {
                info!(task = %task, "{}", line);
            }
        }
    });
}
