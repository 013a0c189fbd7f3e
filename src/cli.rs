// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_DIR;

/// Command-line arguments for `overseer`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "overseer",
    version,
    about = "Watch for changes and run an action with the changed value.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory containing pipeline configuration files (YAML).
    ///
    /// Every `.yaml` / `.yml` file below this directory describes one
    /// watcher/executor pipeline.
    #[arg(long, short = 'c', value_name = "PATH", default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `OVERSEER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the configuration, print the pipelines, but don't
    /// start any watcher.
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
