// src/errors.rs

//! Errors raised while loading a project or walking its task graph.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestageError {
    /// The project file parsed but describes an unusable project.
    #[error("invalid project file: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A task name that is not in the task table.
    #[error("unknown task '{0}'")]
    TaskNotFound(String),

    /// A dependency cycle found by validation, invalidation or sequencing.
    #[error("dependency cycle: {0}")]
    DagCycle(String),

    #[error("malformed project file: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RestageError>;
