#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use restage::config::{ConfigFile, ConfigSection, GroupConfig, RawConfigFile, TaskConfig};
use restage::dag::{TaskRecord, TaskTable};
use restage::errors::Result;
use restage::files::InputFile;
use restage::types::DebouncePolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                group: Vec::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_group(mut self, name: &str, root: impl Into<PathBuf>) -> Self {
        self.config.group.push(GroupConfig {
            name: name.to_string(),
            root: root.into(),
        });
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn debounce_policy(mut self, policy: DebouncePolicy) -> Self {
        self.config.config.debounce_policy = policy;
        self
    }

    pub fn with_default_use_hash(mut self, val: bool) -> Self {
        self.config.config.use_hash = val;
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                files: vec![],
                after: vec![],
                use_hash: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn files(mut self, pattern: &str) -> Self {
        self.task.files.push(pattern.to_string());
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.task.use_hash = Some(val);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Build a task table from `(name, deps)` pairs. Commands are `echo <name>`.
pub fn task_table(tasks: &[(&str, &[&str])]) -> TaskTable {
    TaskTable::new(tasks.iter().map(|(name, deps)| {
        TaskRecord::new(
            *name,
            format!("echo {name}"),
            deps.iter().map(|d| d.to_string()).collect(),
        )
    }))
}

/// An input file of group `group` rooted at `root`.
pub fn input_file(group: &str, root: &str, relative: &str) -> InputFile {
    InputFile {
        group: group.to_string(),
        path: PathBuf::from(root).join(relative),
        relative: relative.to_string(),
    }
}
