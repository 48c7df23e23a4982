// src/dag/scheduler_step.rs

//! Result types returned by scheduler operations.

use std::collections::BTreeSet;

use crate::dag::task::ScheduledTask;
use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks newly marked as failed in this step (the task that failed plus
    /// any queued dependents).
    pub newly_failed: Vec<TaskName>,
    /// Whether this step finished the active sequence.
    pub run_just_finished: bool,
}

/// Outcome of turning the pending invalidations into a new run.
#[derive(Debug, Clone)]
pub struct Reschedule {
    pub run_id: u64,
    /// Union of the frontier sets of every pending task.
    pub frontier: BTreeSet<TaskName>,
    /// Full execution order (frontier plus transitive dependencies).
    pub sequence: Vec<TaskName>,
    pub step: SchedulerStep,
}
