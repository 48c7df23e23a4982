use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use restage::dag::ScheduledTask;
use restage::engine::{RuntimeEvent, TaskOutcome};
use restage::errors::Result;
use restage::exec::ExecutorBackend;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records every task it was asked to run (files and all)
/// - immediately reports `TaskCompleted` for each, failing the configured
///   tasks with exit code 1.
pub struct FakeExecutor {
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<ScheduledTask>>>,
    failing: BTreeSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<ScheduledTask>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: BTreeSet::new(),
        }
    }

    /// Report `task` as failed every time it runs.
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for t in tasks {
                let outcome = if failing.contains(&t.name) {
                    TaskOutcome::Failed(1)
                } else {
                    TaskOutcome::Success
                };
                let name = t.name.clone();
                executed.lock().unwrap().push(t);

                tx.send(RuntimeEvent::TaskCompleted {
                    task: name,
                    outcome,
                })
                .map_err(|err| anyhow::anyhow!("runtime gone: {err}"))?;
            }
            Ok(())
        })
    }
}

/// Names of the recorded tasks, in dispatch order.
pub fn executed_names(executed: &Arc<Mutex<Vec<ScheduledTask>>>) -> Vec<String> {
    executed
        .lock()
        .unwrap()
        .iter()
        .map(|t| t.name.clone())
        .collect()
}
