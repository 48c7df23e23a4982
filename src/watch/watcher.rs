// src/watch/watcher.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::types::ChangeKind;
use crate::watch::batch::{Batch, ChangeBatcher};
use crate::watch::hash::{ContentHashes, compute_file_hash};
use crate::watch::source::WatchSource;
use crate::watch::{BatchFinished, ChangeEvent, ChangeHandler, WatchOptions, WatchedFile};

/// Capacity of the batch-finished broadcast. Subscribers that fall further
/// behind than this see `Lagged` and skip ahead.
const FINISHED_CAPACITY: usize = 64;

struct Binding {
    file: WatchedFile,
    handler: ChangeHandler,
    use_hash: bool,
}

/// Watches individual files, batches their changes into debounce windows and
/// announces the end of each window once every handler in it has run.
pub struct FileWatcher<S: WatchSource> {
    options: WatchOptions,
    source: S,
    started: bool,
    fs: Arc<dyn FileSystem>,
    bindings: HashMap<PathBuf, Vec<Binding>>,
    hashes: ContentHashes,
    event_tx: mpsc::UnboundedSender<ChangeEvent>,
    event_rx: mpsc::UnboundedReceiver<ChangeEvent>,
    finished_tx: broadcast::Sender<BatchFinished>,
}

impl<S: WatchSource> std::fmt::Debug for FileWatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("options", &self.options)
            .field("paths", &self.bindings.len())
            .finish()
    }
}

impl<S: WatchSource> FileWatcher<S> {
    pub fn new(options: WatchOptions, source: S, fs: Arc<dyn FileSystem>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (finished_tx, _) = broadcast::channel(FINISHED_CAPACITY);

        let mut watcher = Self {
            options,
            source,
            started: false,
            fs,
            bindings: HashMap::new(),
            hashes: ContentHashes::new(),
            event_tx,
            event_rx,
            finished_tx,
        };

        match watcher.source.start(watcher.event_tx.clone()) {
            Ok(()) => watcher.started = true,
            Err(err) => warn!("file watching unavailable: {:#}", err),
        }

        watcher
    }

    /// Run `handler` whenever `file` changes.
    ///
    /// Returns `false` if the file could not be watched. That is logged and
    /// never aborts the caller; the file simply produces no notifications.
    pub fn watch(&mut self, file: WatchedFile, handler: ChangeHandler) -> bool {
        self.register(file, handler, false)
    }

    /// Like [`watch`](Self::watch), but notifications whose content digest
    /// matches the last seen one are dropped.
    pub fn watch_content(&mut self, file: WatchedFile, handler: ChangeHandler) -> bool {
        self.register(file, handler, true)
    }

    /// Stream of window completions, one message per closed window.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchFinished> {
        self.finished_tx.subscribe()
    }

    /// Inject change notifications directly, bypassing the watch source.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ChangeEvent> {
        self.event_tx.clone()
    }

    pub fn watched_paths(&self) -> usize {
        self.bindings.len()
    }

    fn register(&mut self, file: WatchedFile, handler: ChangeHandler, use_hash: bool) -> bool {
        if !self.started {
            warn!(task = %file.task, path = ?file.file.path, "not watching file: no watch source");
            return false;
        }

        let key = self
            .fs
            .canonicalize(&file.file.path)
            .unwrap_or_else(|_| file.file.path.clone());

        if !self.bindings.contains_key(&key) {
            if let Err(err) = self.source.open(&key) {
                warn!(task = %file.task, "error watching file: {:#}", err);
                return false;
            }
            debug!(path = ?key, "watching file");
        }

        if use_hash {
            match compute_file_hash(self.fs.as_ref(), &key) {
                Ok(hash) => self.hashes.remember(&key, hash),
                Err(err) => debug!(path = ?key, "no baseline digest: {:#}", err),
            }
        }

        self.bindings.entry(key).or_default().push(Binding {
            file,
            handler,
            use_hash,
        });
        true
    }

    /// Start the event loop on the current tokio runtime.
    pub fn spawn(self) -> WatcherHandle<S> {
        let FileWatcher {
            options,
            source,
            fs,
            bindings,
            hashes,
            event_tx: _,
            event_rx,
            finished_tx,
            ..
        } = self;

        info!(
            paths = bindings.len(),
            delay_ms = options.delay.as_millis() as u64,
            policy = ?options.policy,
            "file watcher started"
        );

        let event_loop = EventLoop {
            batcher: ChangeBatcher::new(options.delay, options.policy),
            fs,
            bindings,
            hashes,
            finished_tx,
        };

        WatcherHandle {
            _source: source,
            task: tokio::spawn(event_loop.run(event_rx)),
        }
    }
}

/// Keeps the watch source alive; dropping it stops the event loop.
pub struct WatcherHandle<S> {
    _source: S,
    task: JoinHandle<()>,
}

impl<S> Drop for WatcherHandle<S> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<S> std::fmt::Debug for WatcherHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

struct EventLoop {
    batcher: ChangeBatcher<ChangeHandler>,
    fs: Arc<dyn FileSystem>,
    bindings: HashMap<PathBuf, Vec<Binding>>,
    hashes: ContentHashes,
    finished_tx: broadcast::Sender<BatchFinished>,
}

impl EventLoop {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<ChangeEvent>) {
        loop {
            let deadline = self.batcher.deadline();

            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => self.on_event(event).await,
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(batch) = self.batcher.take_due(Instant::now()) {
                        self.fire(batch);
                    }
                }
            }
        }

        debug!("watcher event loop finished");
    }

    async fn on_event(&mut self, event: ChangeEvent) {
        if event.kind != ChangeKind::Change {
            debug!(path = ?event.path, kind = ?event.kind, "ignoring non-content event");
            return;
        }

        let Some(key) = self.resolve(&event.path) else {
            debug!(path = ?event.path, "event for unwatched path");
            return;
        };

        let needs_hash = self
            .bindings
            .get(&key)
            .is_some_and(|bindings| bindings.iter().any(|b| b.use_hash));

        // Only bindings that opted into hashing are filtered by content.
        let content_changed = if needs_hash {
            self.content_changed(&key).await
        } else {
            true
        };

        let now = Instant::now();
        let Some(bindings) = self.bindings.get(&key) else {
            return;
        };
        for binding in bindings {
            if binding.use_hash && !content_changed {
                continue;
            }
            self.batcher
                .push(binding.file.clone(), Arc::clone(&binding.handler), now);
        }
    }

    fn resolve(&self, path: &Path) -> Option<PathBuf> {
        if self.bindings.contains_key(path) {
            return Some(path.to_path_buf());
        }
        let canonical = self.fs.canonicalize(path).ok()?;
        self.bindings.contains_key(&canonical).then_some(canonical)
    }

    async fn content_changed(&mut self, path: &Path) -> bool {
        let fs = Arc::clone(&self.fs);
        let owned = path.to_path_buf();
        let digest = tokio::task::spawn_blocking(move || compute_file_hash(fs.as_ref(), &owned)).await;

        match digest {
            Ok(Ok(hash)) => self.hashes.update(path, hash),
            Ok(Err(err)) => {
                // Unreadable files (mid-write, deleted) count as changed.
                warn!(path = ?path, "could not hash changed file: {:#}", err);
                self.hashes.forget(path);
                true
            }
            Err(err) => {
                warn!(path = ?path, "hashing task failed: {}", err);
                true
            }
        }
    }

    fn fire(&mut self, batch: Batch<ChangeHandler>) {
        let batch_id = batch.id();
        let changes = batch.len();
        debug!(batch_id, changes, "closing batch window");

        for (file, handler) in batch.into_entries() {
            handler(&file);
        }

        // No subscribers is fine; nobody cares about this window.
        let _ = self.finished_tx.send(BatchFinished { batch_id, changes });
    }
}
