// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! All mutable build state (task table, pending invalidations, staged files)
//! is owned here and only touched from the runtime loop, one event at a
//! time.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    CoreStep, handle_batch_finished, handle_build_request, handle_file_changed,
    handle_task_completion,
};
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    options: RuntimeOptions,
    /// A batch finished while a run was active; reschedule when it ends.
    reschedule_deferred: bool,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            options,
            reschedule_deferred: false,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn reschedule_deferred(&self) -> bool {
        self.reschedule_deferred
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::BuildRequested => {
                handle_build_request(&mut self.scheduler, &self.options)
            }
            RuntimeEvent::FileChanged { file } => handle_file_changed(&mut self.scheduler, file),
            RuntimeEvent::BatchFinished { batch_id, changes } => handle_batch_finished(
                &mut self.scheduler,
                &mut self.reschedule_deferred,
                batch_id,
                changes,
            ),
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &mut self.reschedule_deferred,
                &self.options,
                task,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
