#![allow(dead_code)]

use std::path::PathBuf;

use overseer::config::{
    CommandExecutorConfig, ExecutorConfig, FileWatcherConfig, LogExecutorConfig, OverseerConfig,
    RawOverseerConfig, TimeWatcherConfig, WatcherConfig, DEFAULT_CHANGE_BUFFER,
};

/// Builder for `OverseerConfig` to simplify test setup.
///
/// Defaults to a 1s time watcher feeding a log executor.
pub struct OverseerConfigBuilder {
    config: RawOverseerConfig,
}

impl OverseerConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            config: RawOverseerConfig {
                name: name.to_string(),
                change_buffer: DEFAULT_CHANGE_BUFFER,
                watcher: WatcherConfig::Time(TimeWatcherConfig::default()),
                executor: ExecutorConfig::Log(LogExecutorConfig::default()),
            },
        }
    }

    pub fn change_buffer(mut self, capacity: usize) -> Self {
        self.config.change_buffer = capacity;
        self
    }

    pub fn watcher(mut self, watcher: WatcherConfig) -> Self {
        self.config.watcher = watcher;
        self
    }

    pub fn executor(mut self, executor: ExecutorConfig) -> Self {
        self.config.executor = executor;
        self
    }

    pub fn file_watcher(self, path: impl Into<PathBuf>) -> Self {
        self.watcher(WatcherConfig::File(FileWatcherConfig {
            path: path.into(),
            poll_seconds: 1,
        }))
    }

    pub fn command_executor(self, command: &str) -> Self {
        self.executor(ExecutorConfig::Command(CommandExecutorConfig::new(command)))
    }

    pub fn raw(self) -> RawOverseerConfig {
        self.config
    }

    pub fn build(self) -> OverseerConfig {
        OverseerConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
