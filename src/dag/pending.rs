// src/dag/pending.rs

use std::collections::BTreeSet;

use tracing::debug;

use crate::engine::TaskName;

/// Task names waiting to be invalidated by the next reschedule.
///
/// Requests are idempotent: asking for the same task several times before
/// the set is consumed leaves one entry.
#[derive(Debug, Clone, Default)]
pub struct PendingInvalidations {
    names: BTreeSet<TaskName>,
}

impl PendingInvalidations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the name was not pending yet.
    pub fn request(&mut self, task: &str) -> bool {
        let inserted = self.names.insert(task.to_string());
        debug!(task = %task, inserted, "invalidation requested");
        inserted
    }

    pub fn contains(&self, task: &str) -> bool {
        self.names.contains(task)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Consume every pending name, leaving the set empty.
    pub fn take(&mut self) -> BTreeSet<TaskName> {
        std::mem::take(&mut self.names)
    }
}
