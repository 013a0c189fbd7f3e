// src/config/mod.rs

//! Configuration loading and validation for overseer.
//!
//! Responsibilities:
//! - Define the YAML-backed data model (`model.rs`).
//! - Load one file or a whole directory of files from disk (`loader.rs`).
//! - Validate field values and cross-file invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_dir, load_from_path, DEFAULT_CONFIG_DIR};
pub use model::{
    CommandExecutorConfig, ExecutorConfig, FileWatcherConfig, GceMetadataWatcherConfig,
    GcpSecretsWatcherConfig, LogExecutorConfig, MetadataSource, OverseerConfig,
    RawOverseerConfig, TimeWatcherConfig, WatcherConfig, DEFAULT_CHANGE_BUFFER,
    DEFAULT_METADATA_URL, DEFAULT_SECRET_MANAGER_URL, DEFAULT_SHELL,
};
pub use validate::validate_unique_names;
