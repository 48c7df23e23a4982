// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, error, info, warn};

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::{RuntimeOptions, TaskName, TaskOutcome};
use crate::watch::WatchedFile;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Request that the process exits (used for `--once` when idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Start a build of everything that has not run yet.
pub fn handle_build_request(scheduler: &mut Scheduler, options: &RuntimeOptions) -> CoreStep {
    if !scheduler.is_idle() {
        warn!("build requested while a run is active; ignoring");
        return CoreStep::running(Vec::new());
    }

    match scheduler.start_full_build() {
        Ok(step) => {
            let mut commands = dispatch(step);
            if options.exit_when_idle && scheduler.is_idle() {
                commands.push(CoreCommand::RequestExit);
                return CoreStep {
                    commands,
                    keep_running: false,
                };
            }
            CoreStep::running(commands)
        }
        Err(err) => {
            error!(error = %err, "cannot start build");
            CoreStep {
                commands: Vec::new(),
                keep_running: !options.exit_when_idle,
            }
        }
    }
}

/// Handler bound to a watched file: stage it on its task, report it and
/// request invalidation of the task.
pub fn handle_file_changed(scheduler: &mut Scheduler, changed: WatchedFile) -> CoreStep {
    let WatchedFile { task, file } = changed;
    let relative = file.relative.clone();

    if let Err(err) = scheduler.stage_file(&task, file) {
        error!(task = %task, file = %relative, error = %err, "cannot stage changed file; ignoring change");
        return CoreStep::running(Vec::new());
    }

    info!(task = %task, file = %relative, "{} was changed, rebuilding...", relative);
    scheduler.request_invalidation(&task);

    CoreStep::running(Vec::new())
}

/// The debounce window closed: turn pending invalidations into a new run,
/// or defer until the active run finishes.
pub fn handle_batch_finished(
    scheduler: &mut Scheduler,
    reschedule_deferred: &mut bool,
    batch_id: u64,
    changes: usize,
) -> CoreStep {
    if !scheduler.is_idle() {
        debug!(
            batch_id,
            changes,
            pending = scheduler.pending().len(),
            "batch finished while a run is active; deferring reschedule"
        );
        *reschedule_deferred = true;
        return CoreStep::running(Vec::new());
    }

    debug!(batch_id, changes, "batch finished");
    CoreStep::running(reschedule(scheduler))
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    reschedule_deferred: &mut bool,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = scheduler.handle_completion(&task, outcome);
    let finished = step.run_just_finished;
    let mut commands = dispatch(step);

    if finished && *reschedule_deferred {
        *reschedule_deferred = false;
        commands.extend(reschedule(scheduler));
    }

    if options.exit_when_idle && scheduler.is_idle() {
        commands.push(CoreCommand::RequestExit);
        return CoreStep {
            commands,
            keep_running: false,
        };
    }

    CoreStep::running(commands)
}

fn reschedule(scheduler: &mut Scheduler) -> Vec<CoreCommand> {
    match scheduler.reschedule() {
        Ok(Some(reschedule)) => dispatch(reschedule.step),
        Ok(None) => {
            debug!("nothing pending; no reschedule");
            Vec::new()
        }
        Err(err) => {
            error!(error = %err, "invalidation failed; affected tasks were not rebuilt");
            Vec::new()
        }
    }
}

fn dispatch(step: SchedulerStep) -> Vec<CoreCommand> {
    if step.newly_scheduled.is_empty() {
        Vec::new()
    } else {
        vec![CoreCommand::DispatchTasks(step.newly_scheduled)]
    }
}
