// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{RestageError, Result};
use crate::files::FileMatcher;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RestageError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.group, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_groups(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_patterns(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(RestageError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(RestageError::ConfigError(
            "[config].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_groups(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for group in &cfg.group {
        if group.name.trim().is_empty() {
            return Err(RestageError::ConfigError(
                "[[group]] entries need a non-empty `name`".to_string(),
            ));
        }
        if !seen.insert(group.name.as_str()) {
            return Err(RestageError::ConfigError(format!(
                "group '{}' is declared more than once",
                group.name
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(RestageError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(RestageError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task, so `[task.B] after = ["A"]` adds A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(RestageError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}

fn validate_patterns(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        FileMatcher::new(&task.files).map_err(|err| {
            RestageError::ConfigError(format!("task '{}' has invalid `files`: {err:#}", name))
        })?;
    }
    Ok(())
}
