// src/errors.rs

//! Crate-wide error type and `Result` alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverseerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown {component} type: {kind}")]
    UnknownComponent {
        component: &'static str,
        kind: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("metadata server returned status {0}")]
    MetadataStatus(reqwest::StatusCode),

    #[error("secret manager returned status {0}")]
    SecretManagerStatus(reqwest::StatusCode),

    #[error("invalid secret payload: {0}")]
    InvalidSecretPayload(String),

    #[error("authentication failed: {0}")]
    AuthError(String),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("manager is already running")]
    AlreadyRunning,

    #[error("manager has already been stopped")]
    AlreadyStopped,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OverseerError>;
