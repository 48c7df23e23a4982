// tests/runtime_fake_executor.rs

use std::error::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Duration;

use restage::config::ConfigFile;
use restage::dag::{ScheduledTask, Scheduler, TaskRunState};
use restage::engine::{CoreCommand, CoreRuntime, CoreStep, Runtime, RuntimeEvent, RuntimeOptions, TaskOutcome};
use restage::files::{InputFile, InputGroups};
use restage::fs::FileSystem;
use restage::fs::mock::MockFileSystem;
use restage::types::ChangeKind;
use restage::watch::{ChangeEvent, FileWatcher, WatchOptions, WatchedFile, bind_task_files, forward_batches};
use restage_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use restage_test_utils::fake_executor::{FakeExecutor, executed_names};
use restage_test_utils::{init_tracing, with_timeout};
use restage_test_utils::manual_source::ManualSource;

type TestResult = Result<(), Box<dyn Error>>;

const BASE: &str = "/proj";

fn project_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/styles/main.scss", "body {}");
    fs.add_file("/proj/src/app/main.js", "import './util.js';");
    fs.add_file("/proj/src/app/util.js", "export {};");
    fs.add_file("/proj/docs/index.md", "# docs");
    fs
}

/// styles <- app <- bundle, styles <- docs
fn site_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_group("src", "src")
        .with_group("docs", "docs")
        .with_task(
            "styles",
            TaskConfigBuilder::new("sass").files("styles/**/*.scss").build(),
        )
        .with_task(
            "app",
            TaskConfigBuilder::new("esbuild")
                .files("app/**/*.js")
                .after("styles")
                .build(),
        )
        .with_task(
            "docs",
            TaskConfigBuilder::new("mdbook").files("*.md").after("styles").build(),
        )
        .with_task("bundle", TaskConfigBuilder::new("zip").after("app").build())
        .build()
}

fn site_scheduler(fs: &MockFileSystem) -> (ConfigFile, Scheduler) {
    let cfg = site_config();
    let groups = InputGroups::load(fs, Path::new(BASE), cfg.groups()).unwrap();
    let scheduler = Scheduler::from_config(&cfg, &groups).unwrap();
    (cfg, scheduler)
}

fn input(scheduler: &Scheduler, task: &str, relative: &str) -> InputFile {
    scheduler
        .task(task)
        .unwrap()
        .inputs
        .iter()
        .find(|f| f.relative == relative)
        .cloned()
        .unwrap_or_else(|| panic!("{task} has no input {relative}"))
}

fn dispatched(step: &CoreStep) -> Vec<ScheduledTask> {
    step.commands
        .iter()
        .flat_map(|command| match command {
            CoreCommand::DispatchTasks(tasks) => tasks.clone(),
            CoreCommand::RequestExit => Vec::new(),
        })
        .collect()
}

/// Complete dispatched tasks until the core stops dispatching, returning
/// everything that ran.
fn drain(core: &mut CoreRuntime, first: CoreStep, failing: &[&str]) -> Vec<ScheduledTask> {
    let mut queue = dispatched(&first);
    let mut ran = Vec::new();
    while !queue.is_empty() {
        let task = queue.remove(0);
        let outcome = if failing.contains(&task.name.as_str()) {
            TaskOutcome::Failed(2)
        } else {
            TaskOutcome::Success
        };
        let step = core.step(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome,
        });
        ran.push(task);
        queue.extend(dispatched(&step));
    }
    ran
}

fn names(tasks: &[ScheduledTask]) -> Vec<&str> {
    tasks.iter().map(|t| t.name.as_str()).collect()
}

fn changed(scheduler: &Scheduler, task: &str, relative: &str) -> RuntimeEvent {
    RuntimeEvent::FileChanged {
        file: WatchedFile {
            task: task.to_string(),
            file: input(scheduler, task, relative),
        },
    }
}

fn batch_finished() -> RuntimeEvent {
    RuntimeEvent::BatchFinished {
        batch_id: 1,
        changes: 1,
    }
}

#[tokio::test]
async fn runtime_with_fake_executor_runs_full_build_once() -> TestResult {
    init_tracing();

    let fs = project_fs();
    let (_cfg, scheduler) = site_scheduler(&fs);

    let (rt_tx, rt_rx) = mpsc::unbounded_channel::<RuntimeEvent>();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    rt_tx.send(RuntimeEvent::BuildRequested)?;

    let core = CoreRuntime::new(
        scheduler,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );
    let runtime = Runtime::new(core, rt_rx, executor);

    let core = with_timeout(runtime.run()).await?;

    let ran = executed_names(&executed);
    assert_eq!(ran.len(), 4, "every task runs once: {ran:?}");
    let pos = |t: &str| ran.iter().position(|n| n == t).unwrap();
    assert!(pos("styles") < pos("app"));
    assert!(pos("styles") < pos("docs"));
    assert!(pos("app") < pos("bundle"));

    for task in executed.lock().unwrap().iter() {
        assert!(!task.incremental, "{} ran on all inputs", task.name);
    }
    let app = executed
        .lock()
        .unwrap()
        .iter()
        .find(|t| t.name == "app")
        .cloned()
        .unwrap();
    assert_eq!(app.files.len(), 2);

    assert!(core.is_idle());
    assert!(core.scheduler().task_names().all(|t| core.scheduler().task(t).unwrap().has_run));
    Ok(())
}

#[test]
fn changed_file_rebuilds_only_affected_tasks_on_that_file() {
    init_tracing();
    let fs = project_fs();
    let (_cfg, scheduler) = site_scheduler(&fs);
    let mut core = CoreRuntime::new(scheduler, RuntimeOptions::default());

    let step = core.step(RuntimeEvent::BuildRequested);
    assert_eq!(drain(&mut core, step, &[]).len(), 4);

    let event = changed(core.scheduler(), "app", "app/main.js");
    let step = core.step(event);
    assert!(step.commands.is_empty(), "handlers only stage and request");
    assert!(core.scheduler().pending().contains("app"));

    let step = core.step(batch_finished());
    let ran = drain(&mut core, step, &[]);

    assert_eq!(names(&ran), vec!["app", "bundle"]);
    assert!(ran[0].incremental);
    assert_eq!(
        ran[0].files.iter().map(|f| f.relative.as_str()).collect::<Vec<_>>(),
        vec!["app/main.js"]
    );
    assert!(!ran[1].incremental);
    assert!(core.scheduler().task("app").unwrap().staged.is_empty());
}

#[test]
fn change_bound_to_unknown_task_does_not_drop_the_batch() {
    let fs = project_fs();
    let (_cfg, scheduler) = site_scheduler(&fs);
    let mut core = CoreRuntime::new(scheduler, RuntimeOptions::default());

    let step = core.step(RuntimeEvent::BuildRequested);
    drain(&mut core, step, &[]);

    let event = changed(core.scheduler(), "app", "app/main.js");
    core.step(event);
    let stray = input(core.scheduler(), "app", "app/util.js");
    core.step(RuntimeEvent::FileChanged {
        file: WatchedFile {
            task: "ghost".to_string(),
            file: stray,
        },
    });
    assert!(!core.scheduler().pending().contains("ghost"));

    let step = core.step(batch_finished());
    let ran = drain(&mut core, step, &[]);

    assert_eq!(names(&ran), vec!["app", "bundle"]);
    assert_eq!(ran[0].files.len(), 1);
    assert!(core.scheduler().task("bundle").unwrap().has_run);
    assert!(core.scheduler().pending().is_empty());
}

#[test]
fn batch_finishing_during_a_run_is_deferred_until_it_ends() {
    let fs = project_fs();
    let (_cfg, scheduler) = site_scheduler(&fs);
    let mut core = CoreRuntime::new(scheduler, RuntimeOptions::default());

    let step = core.step(RuntimeEvent::BuildRequested);
    assert_eq!(names(&dispatched(&step)), vec!["styles"]);

    // styles is still running when docs' window closes.
    let event = changed(core.scheduler(), "docs", "index.md");
    core.step(event);
    let deferred = core.step(batch_finished());
    assert!(deferred.commands.is_empty());
    assert!(core.reschedule_deferred());

    let ran = drain(&mut core, step, &[]);
    let ran = names(&ran);

    // Full build (4), then docs again from the deferred reschedule.
    assert_eq!(ran.len(), 5, "{ran:?}");
    assert_eq!(ran.last(), Some(&"docs"));
    assert!(!core.reschedule_deferred());
    assert!(core.is_idle());
}

#[test]
fn failed_incremental_run_keeps_its_files_for_next_time() {
    let fs = project_fs();
    let (_cfg, scheduler) = site_scheduler(&fs);
    let mut core = CoreRuntime::new(scheduler, RuntimeOptions::default());

    let step = core.step(RuntimeEvent::BuildRequested);
    drain(&mut core, step, &[]);

    let event = changed(core.scheduler(), "app", "app/main.js");
    core.step(event);
    let step = core.step(batch_finished());
    let ran = drain(&mut core, step, &["app"]);

    assert_eq!(names(&ran), vec!["app"], "bundle is blocked by the failure");
    assert_eq!(
        core.scheduler().run_state_of("bundle"),
        Some(TaskRunState::Failed)
    );
    assert_eq!(core.scheduler().task("app").unwrap().staged.files().len(), 1);

    let event = changed(core.scheduler(), "app", "app/util.js");
    core.step(event);
    let step = core.step(batch_finished());
    let ran = drain(&mut core, step, &[]);

    assert_eq!(names(&ran), vec!["app", "bundle"]);
    assert_eq!(ran[0].files.len(), 2);
}

#[test]
fn task_that_never_succeeded_runs_on_all_inputs() {
    let fs = project_fs();
    let (_cfg, scheduler) = site_scheduler(&fs);
    let mut core = CoreRuntime::new(scheduler, RuntimeOptions::default());

    let step = core.step(RuntimeEvent::BuildRequested);
    drain(&mut core, step, &["app"]);

    let event = changed(core.scheduler(), "app", "app/main.js");
    core.step(event);
    let step = core.step(batch_finished());
    let ran = drain(&mut core, step, &[]);

    assert_eq!(names(&ran), vec!["app", "bundle"]);
    assert!(!ran[0].incremental);
    assert_eq!(ran[0].files.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn watched_change_flows_through_watcher_into_a_rebuild() -> TestResult {
    init_tracing();

    let fs = project_fs();
    let (cfg, scheduler) = site_scheduler(&fs);

    let (rt_tx, rt_rx) = mpsc::unbounded_channel::<RuntimeEvent>();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    let shared_fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let mut watcher = FileWatcher::new(
        WatchOptions::new(Duration::from_millis(100), cfg.config_section().debounce_policy),
        ManualSource::new(),
        shared_fs,
    );
    // styles 1, app 2, docs 1; bundle has no inputs.
    assert_eq!(bind_task_files(&mut watcher, &scheduler, &cfg, &rt_tx), 4);
    let events = watcher.event_sender();
    let _forwarder = forward_batches(watcher.subscribe(), rt_tx.clone());
    let _handle = watcher.spawn();

    rt_tx.send(RuntimeEvent::BuildRequested)?;
    let core = CoreRuntime::new(scheduler, RuntimeOptions::default());
    let runtime = tokio::spawn(Runtime::new(core, rt_rx, executor).run());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(executed.lock().unwrap().len(), 4);

    events.send(ChangeEvent {
        path: "/proj/src/styles/main.scss".into(),
        kind: ChangeKind::Change,
    })?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    rt_tx.send(RuntimeEvent::ShutdownRequested)?;
    let core = runtime.await??;

    let ran = executed_names(&executed);
    assert_eq!(ran.len(), 8, "{ran:?}");
    assert_eq!(ran[4], "styles");
    let styles_rerun = executed.lock().unwrap()[4].clone();
    assert!(styles_rerun.incremental);
    assert_eq!(styles_rerun.files.len(), 1);
    assert!(core.is_idle());
    Ok(())
}
