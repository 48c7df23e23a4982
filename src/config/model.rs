// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::DebouncePolicy;

/// Top-level project file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// debounce_ms = 200
///
/// [[group]]
/// name = "vendor"
/// root = "vendor"
///
/// [[group]]
/// name = "app"
/// root = "src"
///
/// [task.styles]
/// cmd = "sassc styles/main.scss dist/main.css"
/// files = ["**/*.scss", "!**/_*.scss"]
///
/// [task.app]
/// cmd = "./bundle.sh"
/// files = ["**/*.js"]
/// after = ["styles"]
/// ```
///
/// All sections are optional and have reasonable defaults; validation
/// (`ConfigFile::try_from`) rejects files without tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Input groups, in the order their files are handed to tasks.
    #[serde(default)]
    pub group: Vec<GroupConfig>,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated project file.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holders can rely on
/// known dependencies, acyclic `after` edges and well-formed groups.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub group: Vec<GroupConfig>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        group: Vec<GroupConfig>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            group,
            task,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn groups(&self) -> &[GroupConfig] {
        &self.group
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Install file watchers after the initial build.
    #[serde(default = "default_watch")]
    pub watch: bool,

    /// Length of the debounce window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// `"fixed"` (default) or `"reset"`.
    #[serde(default)]
    pub debounce_policy: DebouncePolicy,

    /// Drop change notifications whose file content hash did not change.
    #[serde(default)]
    pub use_hash: bool,
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            watch: default_watch(),
            debounce_ms: default_debounce_ms(),
            debounce_policy: DebouncePolicy::default(),
            use_hash: false,
        }
    }
}

fn default_watch() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    200
}

/// `[[group]]` entry: a named directory of input files.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    /// Directory holding the group's files, relative to the project file.
    pub root: PathBuf,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command that performs the task.
    pub cmd: String,

    /// Include / `!`-exclude patterns selecting the task's input files from
    /// every group. An empty list gives the task no input files; a list made
    /// only of exclusions selects every other file.
    #[serde(default)]
    pub files: Vec<String>,

    /// Names of tasks that must have run before this one.
    #[serde(default)]
    pub after: Vec<String>,

    /// Per-task override of `[config].use_hash`.
    #[serde(default)]
    pub use_hash: Option<bool>,
}

impl TaskConfig {
    /// Effective `use_hash` given the project-wide default.
    pub fn effective_use_hash(&self, default_use_hash: bool) -> bool {
        self.use_hash.unwrap_or(default_use_hash)
    }
}
