// src/config/model.rs

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// One pipeline as read from a YAML file, before validation.
///
/// ```yaml
/// name: rollout-secrets
/// change_buffer: 100
/// watcher:
///   type: gce_metadata
///   config:
///     key: attributes/app-secret
/// executor:
///   type: command
///   config:
///     command: install -m 600 "$OVERSEER_DATA" /etc/app/secret
/// ```
///
/// `change_buffer` is optional; `watcher` and `executor` are required and
/// selected by their `type` discriminator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawOverseerConfig {
    /// Name of the pipeline; shows up in every log line it produces.
    pub name: String,

    /// Capacity of the change channel between watcher and executor.
    #[serde(default = "default_change_buffer")]
    pub change_buffer: usize,

    pub watcher: WatcherConfig,

    pub executor: ExecutorConfig,
}

pub const DEFAULT_CHANGE_BUFFER: usize = 100;

fn default_change_buffer() -> usize {
    DEFAULT_CHANGE_BUFFER
}

/// Validated pipeline configuration.
///
/// Only obtainable through `TryFrom<RawOverseerConfig>` (see `validate.rs`),
/// so everything downstream can rely on the invariants checked there.
#[derive(Debug, Clone)]
pub struct OverseerConfig {
    name: String,
    change_buffer: usize,
    watcher: WatcherConfig,
    executor: ExecutorConfig,
}

impl OverseerConfig {
    pub(crate) fn new_unchecked(raw: RawOverseerConfig) -> Self {
        Self {
            name: raw.name,
            change_buffer: raw.change_buffer,
            watcher: raw.watcher,
            executor: raw.executor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn change_buffer(&self) -> usize {
        self.change_buffer
    }

    pub fn watcher(&self) -> &WatcherConfig {
        &self.watcher
    }

    pub fn executor(&self) -> &ExecutorConfig {
        &self.executor
    }
}

/// Watcher section, tagged by `type` with the settings under `config`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum WatcherConfig {
    Time(TimeWatcherConfig),
    File(FileWatcherConfig),
    GceMetadata(GceMetadataWatcherConfig),
    GcpSecrets(GcpSecretsWatcherConfig),
}

impl WatcherConfig {
    /// Discriminator string used to look the constructor up in the registry.
    pub fn kind(&self) -> &'static str {
        match self {
            WatcherConfig::Time(_) => "time",
            WatcherConfig::File(_) => "file",
            WatcherConfig::GceMetadata(_) => "gce_metadata",
            WatcherConfig::GcpSecrets(_) => "gcp_secrets",
        }
    }
}

/// Executor section, tagged by `type` with the settings under `config`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum ExecutorConfig {
    Log(LogExecutorConfig),
    Command(CommandExecutorConfig),
}

impl ExecutorConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorConfig::Log(_) => "log",
            ExecutorConfig::Command(_) => "command",
        }
    }
}

/// `type: time`, ticks at a fixed interval.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWatcherConfig {
    #[serde(default = "default_time_poll_seconds")]
    pub poll_seconds: u64,
}

fn default_time_poll_seconds() -> u64 {
    1
}

impl Default for TimeWatcherConfig {
    fn default() -> Self {
        Self {
            poll_seconds: default_time_poll_seconds(),
        }
    }
}

/// `type: file`, polls the modification time of `path`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileWatcherConfig {
    pub path: PathBuf,

    #[serde(default = "default_file_poll_seconds")]
    pub poll_seconds: u64,
}

fn default_file_poll_seconds() -> u64 {
    5
}

/// Which metadata tree a `gce_metadata` watcher reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    #[default]
    Instance,
    Project,
}

impl MetadataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataSource::Instance => "instance",
            MetadataSource::Project => "project",
        }
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

/// `type: gce_metadata`, long-polls one key on the GCE metadata server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GceMetadataWatcherConfig {
    /// Key below the source tree, e.g. `attributes/app-secret`.
    pub key: String,

    #[serde(default)]
    pub source: MetadataSource,

    #[serde(default)]
    pub recursive: bool,

    /// Override for local testing, e.g. `http://localhost:8888/computeMetadata/v1`.
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    /// Seconds to wait after a failed request before polling again.
    #[serde(default = "default_metadata_error_wait_seconds")]
    pub metadata_error_wait_seconds: u64,
}

fn default_metadata_url() -> String {
    DEFAULT_METADATA_URL.to_string()
}

fn default_metadata_error_wait_seconds() -> u64 {
    1
}

pub const DEFAULT_SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";

/// `type: gcp_secrets`, polls the latest version of a Secret Manager secret.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GcpSecretsWatcherConfig {
    pub project_id: String,

    pub secret_name: String,

    /// `authorized_user` credentials. When unset, tokens for the instance's
    /// default service account come from the metadata server.
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,

    /// Seconds to wait after a failed request before trying again.
    #[serde(default = "default_secret_error_wait_seconds")]
    pub secret_error_wait_seconds: u64,

    /// Where the pipeline installs the secret on this host. Reported in logs
    /// and dry runs; writing it is the executor's job.
    pub secrets_file_path: PathBuf,

    #[serde(default = "default_secret_manager_url")]
    pub secret_manager_url: String,

    /// Metadata server used for default service account tokens.
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
}

fn default_check_interval_seconds() -> u64 {
    60
}

fn default_secret_error_wait_seconds() -> u64 {
    5
}

fn default_secret_manager_url() -> String {
    DEFAULT_SECRET_MANAGER_URL.to_string()
}

impl GcpSecretsWatcherConfig {
    /// Config with every optional field at its default.
    pub fn new(
        project_id: impl Into<String>,
        secret_name: impl Into<String>,
        secrets_file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            secret_name: secret_name.into(),
            credentials_file: None,
            check_interval_seconds: default_check_interval_seconds(),
            secret_error_wait_seconds: default_secret_error_wait_seconds(),
            secrets_file_path: secrets_file_path.into(),
            secret_manager_url: default_secret_manager_url(),
            metadata_url: default_metadata_url(),
        }
    }
}

/// `type: log`, logs every payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LogExecutorConfig {
    #[serde(default)]
    pub tag: String,
}

pub const DEFAULT_SHELL: &str = "/bin/sh -ec";

/// `type: command`, runs a shell command with the payload staged on disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandExecutorConfig {
    pub command: String,

    /// Interpreter plus leading arguments; the command is appended last.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Directory where payloads are staged before the command runs.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Keep staged payloads after the run. Only meant for troubleshooting.
    #[serde(default)]
    pub persist_data: bool,
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir()
}

impl CommandExecutorConfig {
    /// Config with every optional field at its default.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: default_shell(),
            work_dir: default_work_dir(),
            persist_data: false,
        }
    }
}
