// src/dag/table.rs

use std::collections::HashMap;

use tracing::debug;

use crate::dag::DagGraph;
use crate::dag::task::TaskRecord;
use crate::engine::TaskName;
use crate::errors::{RestageError, Result};

/// The task manager's task table: every task record plus the adjacency
/// view used to find dependents.
///
/// Mutated only from the runtime's single event loop.
#[derive(Debug, Clone, Default)]
pub struct TaskTable {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskRecord>,
}

impl TaskTable {
    pub fn new(records: impl IntoIterator<Item = TaskRecord>) -> Self {
        let tasks: HashMap<TaskName, TaskRecord> = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        let graph = DagGraph::from_edges(
            tasks
                .values()
                .map(|record| (record.name.clone(), record.deps.clone())),
        );
        Self { graph, tasks }
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TaskRecord> {
        self.tasks.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TaskRecord> {
        self.tasks.get_mut(name)
    }

    pub fn try_get_mut(&mut self, name: &str) -> Result<&mut TaskRecord> {
        self.tasks
            .get_mut(name)
            .ok_or_else(|| RestageError::TaskNotFound(name.to_string()))
    }

    /// Task names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.graph.tasks()
    }

    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut TaskRecord> {
        self.tasks.values_mut()
    }

    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.graph.dependents_of(name)
    }

    /// Mark a task as not run so the run loop executes it again.
    pub fn reset_task(&mut self, name: &str) -> Result<()> {
        let record = self.try_get_mut(name)?;
        if record.has_run {
            debug!(task = %name, "resetting completion state");
        }
        record.has_run = false;
        Ok(())
    }
}
