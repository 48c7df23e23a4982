use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use restage::watch::{ChangeEvent, WatchSource};
use tokio::sync::mpsc;

/// A watch source without OS notifications. Tests inject changes through
/// `FileWatcher::event_sender` and inspect which paths were opened.
#[derive(Debug, Clone, Default)]
pub struct ManualSource {
    opened: Arc<Mutex<Vec<PathBuf>>>,
    unwatchable: BTreeSet<PathBuf>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open` fail for `path`.
    pub fn unwatchable(mut self, path: impl Into<PathBuf>) -> Self {
        self.unwatchable.insert(path.into());
        self
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl WatchSource for ManualSource {
    fn start(&mut self, _events: mpsc::UnboundedSender<ChangeEvent>) -> Result<()> {
        Ok(())
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        if self.unwatchable.contains(path) {
            return Err(anyhow!("cannot watch {:?}", path));
        }
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}
