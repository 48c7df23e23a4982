// src/watch/binding.rs

//! Glue between the watcher and the engine: every task input becomes a
//! watched file whose handler forwards the change into the runtime channel.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ConfigFile;
use crate::dag::Scheduler;
use crate::engine::RuntimeEvent;
use crate::watch::source::WatchSource;
use crate::watch::{BatchFinished, ChangeHandler, FileWatcher, WatchedFile};

/// Handler that turns one batched change into [`RuntimeEvent::FileChanged`].
pub fn runtime_handler(runtime_tx: mpsc::UnboundedSender<RuntimeEvent>) -> ChangeHandler {
    Arc::new(move |file: &WatchedFile| {
        if runtime_tx
            .send(RuntimeEvent::FileChanged { file: file.clone() })
            .is_err()
        {
            debug!(task = %file.task, "runtime gone; dropping file change");
        }
    })
}

/// Watch every input file of every task. Returns how many bindings were
/// made; files that could not be watched are logged and skipped.
pub fn bind_task_files<S: WatchSource>(
    watcher: &mut FileWatcher<S>,
    scheduler: &Scheduler,
    cfg: &ConfigFile,
    runtime_tx: &mpsc::UnboundedSender<RuntimeEvent>,
) -> usize {
    let default_use_hash = cfg.config_section().use_hash;
    let mut bound = 0;

    for record in scheduler.table().records() {
        let use_hash = cfg
            .tasks()
            .get(&record.name)
            .is_some_and(|task| task.effective_use_hash(default_use_hash));

        for input in &record.inputs {
            let file = WatchedFile {
                task: record.name.clone(),
                file: input.clone(),
            };
            let handler = runtime_handler(runtime_tx.clone());
            let ok = if use_hash {
                watcher.watch_content(file, handler)
            } else {
                watcher.watch(file, handler)
            };
            if ok {
                bound += 1;
            }
        }
    }

    debug!(bound, paths = watcher.watched_paths(), "bound task inputs");
    bound
}

/// Forward window completions into the runtime channel.
///
/// Handlers of a window send their `FileChanged` events synchronously before
/// the window is announced, so on the shared runtime channel the
/// `BatchFinished` always arrives after them.
pub fn forward_batches(
    mut finished: broadcast::Receiver<BatchFinished>,
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let done = match finished.recv().await {
                Ok(done) => done,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed batch notifications; rescheduling anyway");
                    BatchFinished {
                        batch_id: 0,
                        changes: 0,
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let event = RuntimeEvent::BatchFinished {
                batch_id: done.batch_id,
                changes: done.changes,
            };
            if runtime_tx.send(event).is_err() {
                break;
            }
        }
        debug!("batch forwarder finished");
    })
}
