// src/types.rs

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};

/// A single change travelling from a watcher to an executor.
///
/// The pipeline never looks inside it; watcher/executor pairs agree on the
/// shape. Executors that need raw bytes (e.g. to stage the payload on disk)
/// use [`Change::as_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// New value of a remote key.
    Value(String),
    /// Path of a file whose modification time moved.
    Path(PathBuf),
    /// Time at which a ticker fired.
    Tick(DateTime<Utc>),
}

impl Change {
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            Change::Value(v) => v.as_bytes().to_vec(),
            Change::Path(p) => p.to_string_lossy().into_owned().into_bytes(),
            Change::Tick(t) => t.to_rfc3339_opts(SecondsFormat::Millis, true).into_bytes(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Value(v) => f.write_str(v),
            Change::Path(p) => write!(f, "{}", p.display()),
            Change::Tick(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}
