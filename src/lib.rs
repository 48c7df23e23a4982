// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod files;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::dag::{Scheduler, TaskRunState};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::RealExecutorBackend;
use crate::files::InputGroups;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{FileWatcher, NotifySource, WatchOptions, bind_task_files, forward_batches};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and input group enumeration
/// - scheduler / runtime
/// - executor
/// - (optional) file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;

    if let Some(ms) = args.debounce_ms {
        if ms == 0 {
            bail!("--debounce-ms must be > 0");
        }
        cfg.config.debounce_ms = ms;
    }
    if let Some(policy) = args.debounce_policy {
        cfg.config.debounce_policy = policy;
    }

    let base_dir = config_root_dir(&config_path);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let groups = InputGroups::load(fs.as_ref(), &base_dir, cfg.groups())?;
    let scheduler = Scheduler::from_config(&cfg, &groups)?;

    if args.dry_run {
        print_dry_run(&cfg, &groups, &scheduler)?;
        return Ok(());
    }

    // Runtime event channel. Watch handlers are synchronous, so it is
    // unbounded; FIFO order on it keeps every `FileChanged` of a window ahead
    // of the window's `BatchFinished`.
    let (rt_tx, rt_rx) = mpsc::unbounded_channel::<RuntimeEvent>();

    let executor = RealExecutorBackend::new(rt_tx.clone());

    let watching = cfg.config_section().watch && !args.once;
    let _watcher = if watching {
        let mut watcher = FileWatcher::new(
            WatchOptions::from(cfg.config_section()),
            NotifySource::new(),
            Arc::clone(&fs),
        );
        let bound = bind_task_files(&mut watcher, &scheduler, &cfg, &rt_tx);
        info!(bound, "watching task inputs");

        let forwarder = forward_batches(watcher.subscribe(), rt_tx.clone());
        Some((watcher.spawn(), forwarder))
    } else {
        debug!("file watching disabled");
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested);
        });
    }

    rt_tx.send(RuntimeEvent::BuildRequested)?;

    let options = RuntimeOptions {
        exit_when_idle: !watching,
    };

    let core = CoreRuntime::new(scheduler, options);
    let runtime = Runtime::new(core, rt_rx, executor);
    let core = runtime.run().await?;

    // A one-shot build reports failure through the exit status.
    if !watching {
        if let Some(failed) = first_failure(&core) {
            bail!("task '{failed}' failed");
        }
    }
    Ok(())
}

/// Directory that group roots are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "site/Restage.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Restage.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Name of a task whose last run failed, if any.
fn first_failure(core: &CoreRuntime) -> Option<String> {
    let scheduler = core.scheduler();
    scheduler
        .task_names()
        .find(|name| scheduler.run_state_of(name) == Some(TaskRunState::Failed))
        .map(str::to_string)
}

/// Dry-run output: groups, tasks and the order of a full build.
fn print_dry_run(cfg: &ConfigFile, groups: &InputGroups, scheduler: &Scheduler) -> Result<()> {
    println!("restage dry-run");
    println!("  config.debounce_ms = {}", cfg.config_section().debounce_ms);
    println!("  config.debounce_policy = {:?}", cfg.config_section().debounce_policy);
    println!("  config.use_hash = {}", cfg.config_section().use_hash);
    println!();

    println!("groups ({}):", groups.groups().len());
    for group in groups.groups() {
        println!("  - {} ({:?}): {} files", group.name, group.root, group.files.len());
    }
    println!();

    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if !task.files.is_empty() {
            println!("      files: {:?}", task.files);
        }
        if let Some(record) = scheduler.task(name) {
            println!("      inputs: {}", record.inputs.len());
        }
        if let Some(use_hash) = task.use_hash {
            println!("      use_hash: {use_hash}");
        }
    }
    println!();

    let frontier: Vec<&str> = scheduler.table().graph().frontier().collect();
    let order = scheduler.sequence(frontier)?;
    println!("full build order: {}", order.join(" -> "));

    debug!("dry-run complete (no execution)");
    Ok(())
}
