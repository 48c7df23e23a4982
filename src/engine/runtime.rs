// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Async shell around [`CoreRuntime`].
///
/// Reads build requests, watched-file changes, batch boundaries and task
/// completions from one channel, steps the core with each, and hands the
/// tasks the core dispatches to an [`ExecutorBackend`]. All build semantics
/// live in the core.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    events: mpsc::UnboundedReceiver<RuntimeEvent>,
    executor: E,
    dispatched: u64,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("dispatched", &self.dispatched)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        events: mpsc::UnboundedReceiver<RuntimeEvent>,
        executor: E,
    ) -> Self {
        Self {
            core,
            events,
            executor,
            dispatched: 0,
        }
    }

    /// Process events until the core asks to stop or every sender is gone.
    /// Returns the core so callers can inspect the final task table.
    pub async fn run(mut self) -> Result<CoreRuntime> {
        info!("restage runtime started");

        while let Some(event) = self.events.recv().await {
            trace_event(&event);

            let step = self.core.step(event);
            for command in step.commands {
                match command {
                    CoreCommand::DispatchTasks(tasks) => self.dispatch(tasks).await?,
                    CoreCommand::RequestExit => debug!("core requested exit"),
                }
            }

            if !step.keep_running {
                break;
            }
        }

        info!(dispatched = self.dispatched, "restage runtime stopped");
        Ok(self.core)
    }

    async fn dispatch(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        for task in &tasks {
            debug!(
                task = %task.name,
                run_id = task.run_id,
                incremental = task.incremental,
                files = task.files.len(),
                "dispatching task"
            );
        }
        self.dispatched += tasks.len() as u64;

        self.executor.spawn_ready_tasks(tasks).await
    }
}

fn trace_event(event: &RuntimeEvent) {
    match event {
        RuntimeEvent::FileChanged { file } => {
            trace!(task = %file.task, file = %file.file.relative, "file changed");
        }
        RuntimeEvent::BatchFinished { batch_id, changes } => {
            trace!(batch_id, changes, "batch finished");
        }
        RuntimeEvent::TaskCompleted { task, outcome } => {
            trace!(task = %task, ?outcome, "task completed");
        }
        other => trace!(event = ?other, "runtime event"),
    }
}
