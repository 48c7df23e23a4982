// src/watch/mod.rs

//! File watching and change batching.
//!
//! This module is responsible for:
//! - Watching individual input files through a [`WatchSource`] (`notify` by
//!   default).
//! - Collecting changes into debounce windows and calling each change's
//!   handler when the window closes.
//! - Announcing each closed window on a broadcast channel.
//! - (Optionally) dropping notifications whose content did not change.
//!
//! It does **not** know about the DAG; [`binding`] connects it to the engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigSection;
use crate::engine::TaskName;
use crate::files::InputFile;
use crate::types::{ChangeKind, DebouncePolicy};

pub mod batch;
pub mod binding;
pub mod hash;
pub mod source;
pub mod watcher;

pub use batch::{Batch, ChangeBatcher};
pub use binding::{bind_task_files, forward_batches, runtime_handler};
pub use hash::{ContentHashes, compute_file_hash};
pub use source::{NotifySource, WatchSource};
pub use watcher::{FileWatcher, WatcherHandle};

/// An input file together with the task that consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    pub task: TaskName,
    pub file: InputFile,
}

/// Callback run once per batched change, when its window closes.
pub type ChangeHandler = Arc<dyn Fn(&WatchedFile) + Send + Sync>;

/// A raw notification for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Broadcast after every handler of a window has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchFinished {
    pub batch_id: u64,
    pub changes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub delay: Duration,
    pub policy: DebouncePolicy,
}

impl WatchOptions {
    pub fn new(delay: Duration, policy: DebouncePolicy) -> Self {
        Self { delay, policy }
    }
}

impl From<&ConfigSection> for WatchOptions {
    fn from(section: &ConfigSection) -> Self {
        Self {
            delay: Duration::from_millis(section.debounce_ms),
            policy: section.debounce_policy,
        }
    }
}
