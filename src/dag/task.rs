// src/dag/task.rs

//! Task records: static task information plus the mutable build state the
//! invalidation core reads and resets.

use crate::engine::TaskName;
use crate::files::InputFile;

/// Per-run state of a task inside the active sequence (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunState {
    /// In the sequence, waiting for its dependencies.
    Queued,
    /// Dispatched to the executor. Holds the staged files it consumed so a
    /// failure can hand them back.
    Running { consumed: Option<Vec<InputFile>> },
    /// Finished successfully, or skipped because it had already run.
    Done,
    /// Failed, or blocked by a failed dependency.
    Failed,
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not part of the active sequence.
    NotInRun,
    Queued,
    Running,
    Done,
    Failed,
}

impl From<Option<&RunState>> for TaskRunState {
    fn from(state: Option<&RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Queued) => TaskRunState::Queued,
            Some(RunState::Running { .. }) => TaskRunState::Running,
            Some(RunState::Done) => TaskRunState::Done,
            Some(RunState::Failed) => TaskRunState::Failed,
        }
    }
}

/// Files that changed since the task last ran.
///
/// Empty means "no narrowing": the next run processes the full matched set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedFiles {
    files: Vec<InputFile>,
}

impl StagedFiles {
    /// Add a changed file. Staging the same path twice keeps one entry.
    pub fn stage(&mut self, file: InputFile) {
        if !self.files.iter().any(|f| f.path == file.path) {
            self.files.push(file);
        }
    }

    /// Take the staged files, leaving the cell empty.
    pub fn take(&mut self) -> Option<Vec<InputFile>> {
        if self.files.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.files))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[InputFile] {
        &self.files
    }
}

/// One entry of the task table.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub name: TaskName,
    pub cmd: String,
    /// Direct dependencies (names in `after = [...]`).
    pub deps: Vec<TaskName>,
    /// Whether the task has run since it was last invalidated. The run loop
    /// skips tasks for which this is true.
    pub has_run: bool,
    /// Full statically matched input set.
    pub inputs: Vec<InputFile>,
    pub staged: StagedFiles,
    /// Run id of the last successful run.
    pub last_successful_run: Option<u64>,

    pub(crate) run_state: Option<RunState>,
}

impl TaskRecord {
    pub fn new(name: impl Into<TaskName>, cmd: impl Into<String>, deps: Vec<TaskName>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            deps,
            has_run: false,
            inputs: Vec::new(),
            staged: StagedFiles::default(),
            last_successful_run: None,
            run_state: None,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<InputFile>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Files the next run of this task should process.
    ///
    /// Staged files win when the task has succeeded before and something is
    /// staged; they are consumed. Otherwise the full input set is used and
    /// anything staged is dropped.
    /// Returns the files, whether the run is incremental, and the consumed
    /// staged files (if any).
    pub(crate) fn take_run_files(&mut self) -> (Vec<InputFile>, bool, Option<Vec<InputFile>>) {
        let staged = self.staged.take();
        match staged {
            Some(staged) if self.last_successful_run.is_some() => {
                (staged.clone(), true, Some(staged))
            }
            _ => (self.inputs.clone(), false, None),
        }
    }
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub cmd: String,
    /// Files this run should process: the staged subset for incremental
    /// runs, the full matched set otherwise.
    pub files: Vec<InputFile>,
    pub incremental: bool,
    /// All tasks dispatched for the same sequence share the same `run_id`.
    pub run_id: u64,
}
