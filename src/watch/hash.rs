// src/watch/hash.rs

//! Content digests used to drop change notifications for files whose bytes
//! did not actually change (editors that touch files on save, `git checkout`
//! of identical content, ...).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use blake3::Hash;
use tracing::debug;

use crate::fs::FileSystem;

/// Digest of a file's current contents.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<Hash> {
    let bytes = fs.read(path)?;
    Ok(blake3::hash(&bytes))
}

/// Last known digest per watched path.
#[derive(Debug, Default)]
pub struct ContentHashes {
    hashes: HashMap<PathBuf, Hash>,
}

impl ContentHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a baseline digest without reporting a change.
    pub fn remember(&mut self, path: &Path, hash: Hash) {
        self.hashes.insert(path.to_path_buf(), hash);
    }

    /// Store `hash` for `path` and report whether it differs from the
    /// previous digest. A path without a previous digest counts as changed.
    pub fn update(&mut self, path: &Path, hash: Hash) -> bool {
        match self.hashes.insert(path.to_path_buf(), hash) {
            Some(previous) if previous == hash => {
                debug!(path = ?path, "content unchanged");
                false
            }
            _ => true,
        }
    }

    pub fn forget(&mut self, path: &Path) {
        self.hashes.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn identical_rewrite_is_not_a_change() {
        let fs = MockFileSystem::new();
        let path = Path::new("src/app.js");
        fs.add_file(path, "let a = 1;");

        let mut hashes = ContentHashes::new();
        hashes.remember(path, compute_file_hash(&fs, path).unwrap());

        fs.add_file(path, "let a = 1;");
        assert!(!hashes.update(path, compute_file_hash(&fs, path).unwrap()));

        fs.add_file(path, "let a = 2;");
        assert!(hashes.update(path, compute_file_hash(&fs, path).unwrap()));
    }

    #[test]
    fn unknown_path_counts_as_changed() {
        let mut hashes = ContentHashes::new();
        assert!(hashes.update(Path::new("new.js"), blake3::hash(b"x")));
    }
}
