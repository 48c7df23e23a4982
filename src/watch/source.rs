// src/watch/source.rs

//! Where raw change notifications come from.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::types::ChangeKind;
use crate::watch::ChangeEvent;

/// A provider of per-file change notifications.
///
/// [`FileWatcher`](crate::watch::FileWatcher) calls [`start`](WatchSource::start)
/// once with the sender its event loop reads from, then
/// [`open`](WatchSource::open) once per distinct path.
pub trait WatchSource: Send {
    fn start(&mut self, events: mpsc::UnboundedSender<ChangeEvent>) -> Result<()>;

    fn open(&mut self, path: &Path) -> Result<()>;
}

/// Native OS notifications through `notify`.
#[derive(Default)]
pub struct NotifySource {
    inner: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource")
            .field("started", &self.inner.is_some())
            .finish()
    }
}

impl NotifySource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchSource for NotifySource {
    fn start(&mut self, events: mpsc::UnboundedSender<ChangeEvent>) -> Result<()> {
        // Called synchronously on notify's own thread.
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let kind = ChangeKind::from(&event.kind);
                    for path in event.paths {
                        if events.send(ChangeEvent { path, kind }).is_err() {
                            // The event loop is gone; nothing left to notify.
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("file watch error: {err}");
                }
            },
            Config::default(),
        )
        .context("creating native file watcher")?;

        self.inner = Some(watcher);
        Ok(())
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        let watcher = self
            .inner
            .as_mut()
            .ok_or_else(|| anyhow!("native file watcher was not started"))?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {:?}", path))
    }
}
