// src/dag/scheduler.rs

use std::collections::BTreeSet;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::invalidate::invalidate;
use crate::dag::pending::PendingInvalidations;
use crate::dag::scheduler_step::{Reschedule, SchedulerStep};
use crate::dag::sequence::sequence;
use crate::dag::table::TaskTable;
use crate::dag::task::{RunState, ScheduledTask, TaskRecord, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::{RestageError, Result};
use crate::files::{FileMatcher, InputFile, InputGroups};

/// The active sequence.
#[derive(Debug)]
struct ActiveRun {
    id: u64,
    order: Vec<TaskName>,
}

/// Owns the task table, the pending invalidations and the active run.
///
/// It is responsible for:
/// - staging changed files and collecting invalidation requests
/// - turning pending invalidations into a dependency-ordered sequence
/// - dispatching tasks of the sequence once their dependencies have run,
///   skipping those that already ran
/// - failing downstream tasks when a task fails
#[derive(Debug)]
pub struct Scheduler {
    table: TaskTable,
    pending: PendingInvalidations,
    run_counter: u64,
    run: Option<ActiveRun>,
}

impl Scheduler {
    pub fn new(table: TaskTable) -> Self {
        Self {
            table,
            pending: PendingInvalidations::new(),
            run_counter: 0,
            run: None,
        }
    }

    /// Construct a scheduler from a validated [`ConfigFile`], matching every
    /// task's `files` patterns against the loaded input groups.
    pub fn from_config(cfg: &ConfigFile, groups: &InputGroups) -> Result<Self> {
        let mut records = Vec::with_capacity(cfg.tasks().len());

        for (name, tc) in cfg.tasks() {
            // No patterns means no inputs; exclusion-only patterns still
            // select every other file.
            let inputs = if tc.files.is_empty() {
                Vec::new()
            } else {
                let matcher = FileMatcher::new(&tc.files)
                    .with_context(|| format!("compiling file patterns of task '{name}'"))?;
                groups.match_files(&matcher)
            };

            debug!(task = %name, inputs = inputs.len(), "matched task inputs");
            records.push(
                TaskRecord::new(name.clone(), tc.cmd.clone(), tc.after.clone()).with_inputs(inputs),
            );
        }

        Ok(Self::new(TaskTable::new(records)))
    }

    pub fn table(&self) -> &TaskTable {
        &self.table
    }

    pub fn task(&self, name: &str) -> Option<&TaskRecord> {
        self.table.get(name)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.table.names()
    }

    /// Returns `true` if there is no active run.
    pub fn is_idle(&self) -> bool {
        self.run.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.run.as_ref().map(|run| run.id)
    }

    pub fn pending(&self) -> &PendingInvalidations {
        &self.pending
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let record = self.table.get(task)?;
        Some(record.run_state.as_ref().into())
    }

    /// Queue `task` for invalidation at the next reschedule. Idempotent.
    pub fn request_invalidation(&mut self, task: &str) -> bool {
        self.pending.request(task)
    }

    /// Record that `file` changed, narrowing the next run of `task`.
    pub fn stage_file(&mut self, task: &str, file: InputFile) -> Result<()> {
        let record = self.table.try_get_mut(task)?;
        record.staged.stage(file);
        Ok(())
    }

    /// Mark a task as not run.
    pub fn reset_task(&mut self, task: &str) -> Result<()> {
        self.table.reset_task(task)
    }

    /// Execution order for `targets` and their dependencies.
    pub fn sequence<'a, I>(&self, targets: I) -> Result<Vec<TaskName>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        sequence(&self.table, targets)
    }

    /// Start a run over the whole graph: every frontier task and everything
    /// it depends on, skipping tasks that have already run.
    pub fn start_full_build(&mut self) -> Result<SchedulerStep> {
        self.ensure_idle("full build")?;

        let targets: Vec<TaskName> = self
            .table
            .graph()
            .frontier()
            .map(str::to_string)
            .collect();
        let order = self.sequence(targets.iter().map(String::as_str))?;

        info!(tasks = order.len(), "starting full build");
        Ok(self.start_run(order))
    }

    /// Consume the pending invalidations: walk each pending task to its
    /// frontier (resetting everything on the way), sequence the union of
    /// the frontiers and start running it.
    ///
    /// A pending name whose invalidation fails (unknown task, cycle) is
    /// logged and dropped; the other names are still rebuilt. Returns
    /// `Ok(None)` if nothing was left to run. The pending set is always
    /// cleared.
    pub fn reschedule(&mut self) -> Result<Option<Reschedule>> {
        self.ensure_idle("reschedule")?;

        let pending = self.pending.take();
        if pending.is_empty() {
            return Ok(None);
        }

        let mut frontier = BTreeSet::new();
        for task in &pending {
            match invalidate(&mut self.table, task) {
                Ok(reached) => {
                    debug!(task = %task, frontier = ?reached, "invalidated task tree");
                    frontier.extend(reached);
                }
                Err(err) => {
                    error!(task = %task, error = %err, "invalidation failed; task not rebuilt");
                }
            }
        }

        if frontier.is_empty() {
            return Ok(None);
        }

        let order = self.sequence(frontier.iter().map(String::as_str))?;
        info!(
            invalidated = ?pending,
            ?frontier,
            sequence = ?order,
            "rescheduling affected tasks"
        );

        let step = self.start_run(order.clone());
        Ok(Some(Reschedule {
            run_id: self.run_counter,
            frontier,
            sequence: order,
            step,
        }))
    }

    /// Handle completion of a dispatched task.
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id() else {
            warn!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let Some(record) = self.table.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return SchedulerStep::default();
        };

        let consumed = match record.run_state.take() {
            Some(RunState::Running { consumed }) => consumed,
            other => {
                warn!(task = %task, state = ?other, "completion for task that is not running; ignoring");
                record.run_state = other;
                return SchedulerStep::default();
            }
        };

        let mut step = SchedulerStep::default();

        match outcome {
            TaskOutcome::Success => {
                record.run_state = Some(RunState::Done);
                record.has_run = true;
                record.last_successful_run = Some(run_id);
                debug!(task = %task, run_id, "task completed successfully");
            }
            TaskOutcome::Failed(code) => {
                record.run_state = Some(RunState::Failed);
                // The changed files were not processed; keep them for the
                // next rebuild.
                for file in consumed.into_iter().flatten() {
                    record.staged.stage(file);
                }
                warn!(
                    task = %task,
                    run_id,
                    exit_code = code,
                    "task failed; failing dependents in this run"
                );
                step.newly_failed.push(task.to_string());
                step.newly_failed.extend(self.fail_dependents(task));
            }
        }

        step.newly_scheduled = self.collect_ready();
        step.run_just_finished = self.maybe_finish_run();
        step
    }

    fn ensure_idle(&self, what: &str) -> Result<()> {
        match &self.run {
            None => Ok(()),
            Some(run) => Err(RestageError::Other(anyhow::anyhow!(
                "{what} requested while run {} is still active",
                run.id
            ))),
        }
    }

    fn start_run(&mut self, order: Vec<TaskName>) -> SchedulerStep {
        self.run_counter += 1;
        let run_id = self.run_counter;

        for record in self.table.records_mut() {
            record.run_state = None;
        }

        for name in &order {
            if let Some(record) = self.table.get_mut(name) {
                if record.has_run {
                    debug!(task = %name, run_id, "already up to date; skipping");
                    record.run_state = Some(RunState::Done);
                } else {
                    record.run_state = Some(RunState::Queued);
                }
            }
        }

        debug!(run_id, sequence = ?order, "scheduler: starting run");
        self.run = Some(ActiveRun { id: run_id, order });

        let newly_scheduled = self.collect_ready();
        let run_just_finished = self.maybe_finish_run();
        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    /// Dispatch every queued task whose dependencies have all run, in
    /// sequence order.
    fn collect_ready(&mut self) -> Vec<ScheduledTask> {
        let Some(run) = &self.run else {
            return Vec::new();
        };
        let run_id = run.id;

        let ready: Vec<TaskName> = run
            .order
            .iter()
            .filter(|name| {
                self.table.get(name).is_some_and(|record| {
                    record.run_state == Some(RunState::Queued)
                        && record
                            .deps
                            .iter()
                            .all(|dep| self.table.get(dep).is_some_and(|d| d.has_run))
                })
            })
            .cloned()
            .collect();

        let mut scheduled = Vec::with_capacity(ready.len());
        for name in ready {
            let Some(record) = self.table.get_mut(&name) else {
                continue;
            };

            let (files, incremental, consumed) = record.take_run_files();
            if incremental {
                info!(task = %name, run_id, files = files.len(), "running task on changed files");
            } else {
                info!(task = %name, run_id, files = files.len(), "running task on all inputs");
            }

            record.run_state = Some(RunState::Running { consumed });
            scheduled.push(ScheduledTask {
                name: record.name.clone(),
                cmd: record.cmd.clone(),
                files,
                incremental,
                run_id,
            });
        }

        scheduled
    }

    /// Mark queued downstream tasks of a failed task as failed for this run.
    fn fail_dependents(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.table.dependents_of(failed_task).to_vec();
        let mut newly_failed = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(record) = self.table.get_mut(&name) {
                if record.run_state == Some(RunState::Queued) {
                    record.run_state = Some(RunState::Failed);
                    debug!(task = %name, "blocked by upstream failure");
                    newly_failed.push(name.clone());
                    stack.extend(self.table.dependents_of(&name).iter().cloned());
                }
            }
        }

        newly_failed
    }

    /// Clear the active run once nothing in it is queued or running.
    fn maybe_finish_run(&mut self) -> bool {
        let Some(run) = &self.run else {
            return false;
        };

        let busy = run.order.iter().any(|name| {
            self.table.get(name).is_some_and(|record| {
                matches!(
                    record.run_state,
                    Some(RunState::Queued) | Some(RunState::Running { .. })
                )
            })
        });

        if busy {
            return false;
        }

        info!(run_id = run.id, "scheduler: sequence finished");
        self.run = None;
        true
    }
}
