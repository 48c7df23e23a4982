// src/engine/mod.rs

//! Orchestration engine for restage.
//!
//! This module ties together:
//! - the scheduler (task table, pending invalidations, runs)
//! - the main runtime event loop that reacts to:
//!   - the initial build request
//!   - per-file change handlers and batch-finished signals from the watcher
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::watch::WatchedFile;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task process for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(i32),
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once the scheduler is idle (used for
    /// `--once`).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the watcher, executors, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Build every task that has not run yet.
    BuildRequested,
    /// A watched file bound to a task changed (one batch handler call).
    FileChanged { file: WatchedFile },
    /// The debounce window closed after all of its handlers ran.
    BatchFinished { batch_id: u64, changes: usize },
    /// A task process exited with a concrete outcome.
    TaskCompleted { task: TaskName, outcome: TaskOutcome },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
