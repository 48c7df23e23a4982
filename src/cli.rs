// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::DebouncePolicy;

/// Command-line arguments for `restage`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "restage",
    version,
    about = "Build a project once, then rebuild only the tasks affected by file changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project file (TOML).
    ///
    /// Default: `Restage.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Restage.toml")]
    pub config: String,

    /// Run a single full build and exit; no files are watched.
    #[arg(long)]
    pub once: bool,

    /// Override `[config].debounce_ms`.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Override `[config].debounce_policy` (`fixed` or `reset`).
    #[arg(long, value_name = "POLICY")]
    pub debounce_policy: Option<DebouncePolicy>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RESTAGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print groups and tasks, but don't build anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
