// src/files/groups.rs

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::GroupConfig;
use crate::files::FileMatcher;
use crate::fs::FileSystem;

/// One file of an input group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputFile {
    /// Name of the group the file was found in.
    pub group: String,
    /// Path on disk (group root joined with `relative`).
    pub path: PathBuf,
    /// Path relative to the group root, with forward slashes.
    pub relative: String,
}

/// A named directory of input files, listed once at startup.
#[derive(Debug, Clone)]
pub struct InputGroup {
    pub name: String,
    pub root: PathBuf,
    /// Sorted by `relative`.
    pub files: Vec<InputFile>,
}

/// All input groups of a project, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct InputGroups {
    groups: Vec<InputGroup>,
}

impl InputGroups {
    /// List every group's files. Group roots are resolved against `base_dir`.
    ///
    /// A group whose root is missing is reported and contributes no files.
    pub fn load(fs: &dyn FileSystem, base_dir: &Path, groups: &[GroupConfig]) -> Result<Self> {
        let mut loaded = Vec::with_capacity(groups.len());

        for group in groups {
            let root = base_dir.join(&group.root);
            let files = if fs.is_dir(&root) {
                collect_group_files(fs, &group.name, &root)?
            } else {
                warn!(group = %group.name, root = ?root, "missing group; it contributes no files");
                Vec::new()
            };

            debug!(group = %group.name, files = files.len(), "loaded input group");
            loaded.push(InputGroup {
                name: group.name.clone(),
                root,
                files,
            });
        }

        Ok(Self { groups: loaded })
    }

    pub fn groups(&self) -> &[InputGroup] {
        &self.groups
    }

    /// Files selected by `matcher`, group by group in declaration order.
    pub fn match_files(&self, matcher: &FileMatcher) -> Vec<InputFile> {
        self.groups
            .iter()
            .flat_map(|group| group.files.iter())
            .filter(|file| matcher.matches(&file.relative))
            .cloned()
            .collect()
    }
}

fn collect_group_files(fs: &dyn FileSystem, group: &str, root: &Path) -> Result<Vec<InputFile>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let relative = rel.to_string_lossy().replace('\\', "/");
                    files.push(InputFile {
                        group: group.to_string(),
                        path: path.clone(),
                        relative,
                    });
                }
            }
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
