// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{
    CommandExecutorConfig, ExecutorConfig, FileWatcherConfig, GceMetadataWatcherConfig,
    GcpSecretsWatcherConfig, OverseerConfig, RawOverseerConfig, TimeWatcherConfig, WatcherConfig,
};
use crate::errors::{OverseerError, Result};

impl TryFrom<RawOverseerConfig> for OverseerConfig {
    type Error = OverseerError;

    fn try_from(raw: RawOverseerConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(OverseerConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawOverseerConfig) -> Result<()> {
    if cfg.name.trim().is_empty() {
        return Err(config_error("name is required"));
    }

    if cfg.change_buffer == 0 {
        return Err(config_error(format!(
            "overseer '{}': change_buffer must be >= 1 (got 0)",
            cfg.name
        )));
    }

    validate_watcher(&cfg.watcher)
        .map_err(|e| prefix(&cfg.name, "watcher", cfg.watcher.kind(), e))?;
    validate_executor(&cfg.executor)
        .map_err(|e| prefix(&cfg.name, "executor", cfg.executor.kind(), e))?;

    Ok(())
}

fn validate_watcher(watcher: &WatcherConfig) -> std::result::Result<(), String> {
    match watcher {
        WatcherConfig::Time(TimeWatcherConfig { poll_seconds }) => {
            ensure_positive("poll_seconds", *poll_seconds)
        }
        WatcherConfig::File(FileWatcherConfig { path, poll_seconds }) => {
            if path.as_os_str().is_empty() {
                return Err("path must not be empty".to_string());
            }
            ensure_positive("poll_seconds", *poll_seconds)
        }
        WatcherConfig::GceMetadata(GceMetadataWatcherConfig {
            key,
            metadata_url,
            metadata_error_wait_seconds,
            ..
        }) => {
            ensure_non_empty("key", key)?;
            ensure_non_empty("metadata_url", metadata_url)?;
            ensure_positive("metadata_error_wait_seconds", *metadata_error_wait_seconds)
        }
        WatcherConfig::GcpSecrets(GcpSecretsWatcherConfig {
            project_id,
            secret_name,
            credentials_file,
            check_interval_seconds,
            secret_error_wait_seconds,
            secrets_file_path,
            secret_manager_url,
            metadata_url,
        }) => {
            ensure_non_empty("project_id", project_id)?;
            ensure_non_empty("secret_name", secret_name)?;
            if credentials_file
                .as_ref()
                .is_some_and(|path| path.as_os_str().is_empty())
            {
                return Err("credentials_file must not be empty when set".to_string());
            }
            if secrets_file_path.as_os_str().is_empty() {
                return Err("secrets_file_path must not be empty".to_string());
            }
            ensure_non_empty("secret_manager_url", secret_manager_url)?;
            ensure_non_empty("metadata_url", metadata_url)?;
            ensure_positive("check_interval_seconds", *check_interval_seconds)?;
            ensure_positive("secret_error_wait_seconds", *secret_error_wait_seconds)
        }
    }
}

fn validate_executor(executor: &ExecutorConfig) -> std::result::Result<(), String> {
    match executor {
        ExecutorConfig::Log(_) => Ok(()),
        ExecutorConfig::Command(CommandExecutorConfig {
            command,
            shell,
            work_dir,
            ..
        }) => {
            ensure_non_empty("command", command)?;
            ensure_non_empty("shell", shell)?;
            if work_dir.as_os_str().is_empty() {
                return Err("work_dir must not be empty".to_string());
            }
            Ok(())
        }
    }
}

/// Pipeline names are used to correlate log lines, so they must be unique
/// across the whole configuration directory.
pub fn validate_unique_names(configs: &[OverseerConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for cfg in configs {
        if !seen.insert(cfg.name()) {
            return Err(config_error(format!(
                "duplicate overseer name '{}'",
                cfg.name()
            )));
        }
    }
    Ok(())
}

fn ensure_non_empty(field: &str, value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn ensure_positive(field: &str, value: u64) -> std::result::Result<(), String> {
    if value < 1 {
        return Err(format!("{field} must be greater than or equal to 1"));
    }
    Ok(())
}

fn prefix(name: &str, component: &str, kind: &str, msg: String) -> OverseerError {
    config_error(format!("overseer '{name}': {component} '{kind}': {msg}"))
}

fn config_error(msg: impl Into<String>) -> OverseerError {
    OverseerError::ConfigError(msg.into())
}
