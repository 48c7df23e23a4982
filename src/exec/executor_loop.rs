// src/exec/executor_loop.rs

//! Background loop that manages running task processes.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskName};
use crate::exec::task_runner::run_task;

/// Handle for a currently-running task process.
struct ActiveTask {
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// Each scheduled task runs in its own Tokio task. Per task name there is
/// never more than one process: a newer request for a task that is still
/// running kills the older process first.
pub fn spawn_executor(
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<TaskName, ActiveTask> = HashMap::new();

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &mut active, &runtime_tx);
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

fn handle_scheduled_task(
    task: ScheduledTask,
    active: &mut HashMap<TaskName, ActiveTask>,
    runtime_tx: &mpsc::UnboundedSender<RuntimeEvent>,
) {
    let name = task.name.clone();

    if let Some(existing) = active.get_mut(&name) {
        if !existing.handle.is_finished() {
            warn!(
                task = %name,
                run_id = task.run_id,
                "task still running from an earlier request; killing it"
            );
            if let Some(cancel) = existing.cancel.take() {
                if cancel.send(()).is_err() {
                    debug!(task = %name, "previous process finished while cancelling");
                }
            }
        }
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let rt_tx = runtime_tx.clone();
    let spawn_name = name.clone();

    let handle = tokio::spawn(async move {
        run_task(task, rt_tx, cancel_rx).await;
        debug!(task = %spawn_name, "task runner future finished");
    });

    active.insert(
        name,
        ActiveTask {
            cancel: Some(cancel_tx),
            handle,
        },
    );
}
