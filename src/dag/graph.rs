// src/dag/graph.rs

use std::collections::BTreeMap;

use crate::engine::TaskName;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must have run before this one.
    deps: Vec<TaskName>,
    /// Direct dependents: tasks that list this one in their `after`.
    dependents: Vec<TaskName>,
}

/// In-memory adjacency view of the task graph, keyed by task name.
///
/// Nothing here rejects cycles. Configs are checked in `config::validate`;
/// hand-built tables may still contain them, and the walker and the
/// sequencer report those as errors.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskName, DagNode>,
}

impl DagGraph {
    /// Build a graph from `(task, dependencies)` pairs.
    ///
    /// Dependencies naming unknown tasks are kept in the task's dependency
    /// list but produce no dependent edge.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (TaskName, Vec<TaskName>)>,
    {
        let mut nodes: BTreeMap<TaskName, DagNode> = edges
            .into_iter()
            .map(|(name, deps)| {
                (
                    name,
                    DagNode {
                        deps,
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        let edges: Vec<(TaskName, TaskName)> = nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |dep| (dep.clone(), name.clone())))
            .collect();

        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(dependent);
            }
        }

        Self { nodes }
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks nothing depends on.
    pub fn frontier(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.dependents.is_empty())
            .map(|(name, _)| name.as_str())
    }
}
