// src/dag/invalidate.rs

//! Invalidation walker.
//!
//! Starting from a stale task, follow the "is depended on by" edges to every
//! task nothing depends on (the frontier), resetting the completion state of
//! every task on the way. The frontier is what gets handed to the sequencer,
//! which expands it back into the full upstream chain.

use std::collections::{BTreeSet, HashSet};

use crate::dag::table::TaskTable;
use crate::engine::TaskName;
use crate::errors::{RestageError, Result};

/// Reset `task` and everything downstream of it, returning the frontier
/// tasks reachable from it.
///
/// Fails with [`RestageError::TaskNotFound`] for an unknown name and with
/// [`RestageError::DagCycle`] if the walk re-enters a task on its own path.
/// Tasks visited before an error keep their reset state.
pub fn invalidate(table: &mut TaskTable, task: &str) -> Result<BTreeSet<TaskName>> {
    let mut walk = Walk::default();
    walk.visit(table, task)?;
    Ok(walk.frontier)
}

#[derive(Default)]
struct Walk {
    /// Tasks on the current branch, for cycle detection.
    path: Vec<TaskName>,
    /// Tasks whose whole downstream tree has been reset already.
    done: HashSet<TaskName>,
    frontier: BTreeSet<TaskName>,
}

impl Walk {
    fn visit(&mut self, table: &mut TaskTable, task: &str) -> Result<()> {
        if self.done.contains(task) {
            return Ok(());
        }
        if self.path.iter().any(|seen| seen == task) {
            self.path.push(task.to_string());
            return Err(RestageError::DagCycle(format!(
                "invalidation walk re-entered task '{}' via {}",
                task,
                self.path.join(" -> ")
            )));
        }
        if !table.contains(task) {
            return Err(RestageError::TaskNotFound(task.to_string()));
        }

        let dependents = table.dependents_of(task).to_vec();
        table.reset_task(task)?;

        if dependents.is_empty() {
            self.frontier.insert(task.to_string());
        } else {
            self.path.push(task.to_string());
            for dependent in &dependents {
                self.visit(table, dependent)?;
            }
            self.path.pop();
        }

        self.done.insert(task.to_string());
        Ok(())
    }
}
