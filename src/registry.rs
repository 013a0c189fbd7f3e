// src/registry.rs

//! Constructor table for watchers and executors.
//!
//! Each configuration variant carries a discriminator such as `"file"`,
//! `"gcp_secrets"` or `"command"`. The registry maps that string to
//! a constructor taking the typed configuration and the span the component
//! should log under. It is built once at startup and handed to the
//! [`Manager`](crate::engine::Manager) by reference; tests register extra
//! constructors or override the built-in ones.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info_span, Span};

use crate::config::{ExecutorConfig, OverseerConfig, WatcherConfig};
use crate::engine::Pipeline;
use crate::errors::{OverseerError, Result};
use crate::exec::{CommandExecutor, Executor, LogExecutor};
use crate::watch::{FileWatcher, GceMetadataWatcher, GcpSecretsWatcher, TimeWatcher, Watcher};

pub type WatcherConstructor =
    Box<dyn Fn(&WatcherConfig, Span) -> Result<Arc<dyn Watcher>> + Send + Sync>;

pub type ExecutorConstructor =
    Box<dyn Fn(&ExecutorConfig, Span) -> Result<Arc<dyn Executor>> + Send + Sync>;

pub struct Registry {
    watchers: HashMap<String, WatcherConstructor>,
    executors: HashMap<String, ExecutorConstructor>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut watchers: Vec<_> = self.watchers.keys().collect();
        let mut executors: Vec<_> = self.executors.keys().collect();
        watchers.sort();
        executors.sort();
        f.debug_struct("Registry")
            .field("watchers", &watchers)
            .field("executors", &executors)
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Registry {
    /// Registry with no constructors at all.
    pub fn empty() -> Self {
        Self {
            watchers: HashMap::new(),
            executors: HashMap::new(),
        }
    }

    /// Registry with every watcher and executor shipped by this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register_watcher("time", |cfg, span| match cfg {
            WatcherConfig::Time(c) => Ok(Arc::new(TimeWatcher::from_config(c, span)) as Arc<dyn Watcher>),
            other => Err(mismatch("time", other.kind())),
        });
        registry.register_watcher("file", |cfg, span| match cfg {
            WatcherConfig::File(c) => Ok(Arc::new(FileWatcher::from_config(c, span)) as Arc<dyn Watcher>),
            other => Err(mismatch("file", other.kind())),
        });
        registry.register_watcher("gce_metadata", |cfg, span| match cfg {
            WatcherConfig::GceMetadata(c) => {
                Ok(Arc::new(GceMetadataWatcher::from_config(c, span)?) as Arc<dyn Watcher>)
            }
            other => Err(mismatch("gce_metadata", other.kind())),
        });
        registry.register_watcher("gcp_secrets", |cfg, span| match cfg {
            WatcherConfig::GcpSecrets(c) => {
                Ok(Arc::new(GcpSecretsWatcher::from_config(c, span)?) as Arc<dyn Watcher>)
            }
            other => Err(mismatch("gcp_secrets", other.kind())),
        });

        registry.register_executor("log", |cfg, span| match cfg {
            ExecutorConfig::Log(c) => Ok(Arc::new(LogExecutor::from_config(c, span)) as Arc<dyn Executor>),
            other => Err(mismatch("log", other.kind())),
        });
        registry.register_executor("command", |cfg, span| match cfg {
            ExecutorConfig::Command(c) => {
                Ok(Arc::new(CommandExecutor::new(c, span)?) as Arc<dyn Executor>)
            }
            other => Err(mismatch("command", other.kind())),
        });

        registry
    }

    /// Register (or replace) the constructor for a watcher type.
    pub fn register_watcher<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&WatcherConfig, Span) -> Result<Arc<dyn Watcher>> + Send + Sync + 'static,
    {
        self.watchers.insert(kind.into(), Box::new(constructor));
    }

    /// Register (or replace) the constructor for an executor type.
    pub fn register_executor<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&ExecutorConfig, Span) -> Result<Arc<dyn Executor>> + Send + Sync + 'static,
    {
        self.executors.insert(kind.into(), Box::new(constructor));
    }

    pub fn build_watcher(&self, overseer: &str, cfg: &WatcherConfig) -> Result<Arc<dyn Watcher>> {
        let kind = cfg.kind();
        let constructor = self
            .watchers
            .get(kind)
            .ok_or_else(|| OverseerError::UnknownComponent {
                component: "watcher",
                kind: kind.to_string(),
            })?;

        constructor(cfg, info_span!("watcher", overseer = %overseer, watcher = kind))
    }

    pub fn build_executor(
        &self,
        overseer: &str,
        cfg: &ExecutorConfig,
    ) -> Result<Arc<dyn Executor>> {
        let kind = cfg.kind();
        let constructor = self
            .executors
            .get(kind)
            .ok_or_else(|| OverseerError::UnknownComponent {
                component: "executor",
                kind: kind.to_string(),
            })?;

        constructor(cfg, info_span!("executor", overseer = %overseer, executor = kind))
    }

    /// Materialise both halves of a pipeline from its configuration.
    pub fn build_pipeline(&self, cfg: &OverseerConfig) -> Result<Pipeline> {
        let watcher = self.build_watcher(cfg.name(), cfg.watcher())?;
        let executor = self.build_executor(cfg.name(), cfg.executor())?;

        Ok(Pipeline {
            name: cfg.name().to_string(),
            change_buffer: cfg.change_buffer(),
            watcher,
            executor,
        })
    }
}

fn mismatch(registered: &str, got: &str) -> OverseerError {
    OverseerError::ConfigError(format!(
        "constructor registered for '{registered}' received a '{got}' configuration"
    ))
}
