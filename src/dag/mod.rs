// src/dag/mod.rs

//! Task graph, invalidation and scheduling.
//!
//! - [`graph`] holds dependency / dependent adjacency per task.
//! - [`task`] defines task records, staged files and scheduled tasks.
//! - [`table`] is the task table the rest of this module mutates.
//! - [`pending`] accumulates invalidation requests between batches.
//! - [`invalidate`] walks a stale task to its frontier, resetting state.
//! - [`sequence`] turns target tasks into a dependency-first order.
//! - [`scheduler`] drives runs over the table.

pub mod graph;
pub mod invalidate;
pub mod pending;
pub mod scheduler;
pub mod scheduler_step;
pub mod sequence;
pub mod table;
pub mod task;

pub use graph::DagGraph;
pub use invalidate::invalidate;
pub use pending::PendingInvalidations;
pub use scheduler::Scheduler;
pub use scheduler_step::{Reschedule, SchedulerStep};
pub use sequence::sequence;
pub use table::TaskTable;
pub use task::{ScheduledTask, StagedFiles, TaskRecord, TaskRunState};
