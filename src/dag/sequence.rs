// src/dag/sequence.rs

use std::collections::HashSet;

use crate::dag::table::TaskTable;
use crate::engine::TaskName;
use crate::errors::{RestageError, Result};

/// Linear execution order covering `targets` and all of their transitive
/// dependencies.
///
/// Dependencies always precede their dependents and every task appears
/// once, however many targets reach it. Targets are expanded in the order
/// given, dependencies in declaration order.
pub fn sequence<'a, I>(table: &TaskTable, targets: I) -> Result<Vec<TaskName>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order = Vec::new();
    let mut done = HashSet::new();
    let mut path = Vec::new();

    for target in targets {
        visit(table, target, &mut path, &mut done, &mut order)?;
    }

    Ok(order)
}

fn visit(
    table: &TaskTable,
    task: &str,
    path: &mut Vec<TaskName>,
    done: &mut HashSet<TaskName>,
    order: &mut Vec<TaskName>,
) -> Result<()> {
    if done.contains(task) {
        return Ok(());
    }
    if path.iter().any(|seen| seen == task) {
        path.push(task.to_string());
        return Err(RestageError::DagCycle(format!(
            "sequencing re-entered task '{}' via {}",
            task,
            path.join(" -> ")
        )));
    }

    let record = table
        .get(task)
        .ok_or_else(|| RestageError::TaskNotFound(task.to_string()))?;

    path.push(task.to_string());
    for dep in &record.deps {
        visit(table, dep, path, done, order)?;
    }
    path.pop();

    done.insert(task.to_string());
    order.push(task.to_string());
    Ok(())
}
