// src/logging.rs

//! `tracing` subscriber setup.
//!
//! The filter comes from, in order:
//! 1. the `--log-level` flag, applied to every target;
//! 2. `OVERSEER_LOG`, a full `EnvFilter` directive such as
//!    `info,overseer::watch=debug,reqwest=warn`;
//! 3. `info`.
//!
//! Output goes to stderr. Pipeline components log inside spans carrying the
//! overseer name and component type, so lines from different pipelines can
//! be told apart without extra formatting.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable read when no `--log-level` flag is given.
pub const LOG_ENV_VAR: &str = "OVERSEER_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(directive(level)),
        None => match EnvFilter::try_from_env(LOG_ENV_VAR) {
            Ok(filter) => filter,
            Err(err) => {
                if std::env::var_os(LOG_ENV_VAR).is_some() {
                    eprintln!("ignoring invalid {LOG_ENV_VAR}: {err}");
                }
                EnvFilter::new(DEFAULT_DIRECTIVE)
            }
        },
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
