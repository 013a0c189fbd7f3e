// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{OverseerConfig, RawOverseerConfig};
use crate::config::validate::validate_unique_names;
use crate::errors::{OverseerError, Result};

/// Default directory scanned by the daemon.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/overseer.d";

/// Load a single pipeline file and return the raw `RawOverseerConfig`.
///
/// This only performs YAML deserialization; use [`load_and_validate`] to
/// also check field values.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawOverseerConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawOverseerConfig = serde_yaml::from_str(&contents).map_err(|e| {
        OverseerError::ConfigError(format!("{}: {e}", path.display()))
    })?;

    Ok(config)
}

/// Load a single pipeline file and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<OverseerConfig> {
    let raw_config = load_from_path(&path)?;
    OverseerConfig::try_from(raw_config)
}

/// Load every `.yaml` / `.yml` file below `dir` (recursively), in sorted
/// path order, one pipeline per file.
///
/// Fails on the first invalid file, on duplicate pipeline names, and when
/// the directory contains no configuration at all.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<OverseerConfig>> {
    let dir = dir.as_ref();
    let files = config_files_in(dir)?;

    if files.is_empty() {
        return Err(OverseerError::ConfigError(format!(
            "no .yaml or .yml files found in {}",
            dir.display()
        )));
    }

    let mut configs = Vec::with_capacity(files.len());
    for file in files {
        debug!(path = %file.display(), "loading overseer config");
        configs.push(load_and_validate(&file)?);
    }

    validate_unique_names(&configs)?;
    Ok(configs)
}

fn config_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_yaml(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
