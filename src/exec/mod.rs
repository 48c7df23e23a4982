// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs the shell command of each scheduled task with `tokio::process` and
//! reports back to the runtime via `RuntimeEvent::TaskCompleted`.
//!
//! - [`executor_loop`] owns the background loop that manages task processes.
//! - [`task_runner`] runs a single task process.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`; tests swap in a fake implementation.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
