// src/watch/gcp_secrets.rs

//! Polling watcher for a secret in GCP Secret Manager.
//!
//! Every check interval the watcher reads the metadata of the secret's
//! `latest` version. The payload is accessed and emitted only when that
//! version's ETag differs from the last emitted one, so an unchanged secret
//! costs one small request per interval.
//!
//! A failed request is logged and retried after the error wait instead of
//! the full check interval. Stopping the watcher drops any in-flight request.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument, Span};

use crate::config::GcpSecretsWatcherConfig;
use crate::errors::{OverseerError, Result};
use crate::types::Change;
use crate::watch::gcp_auth::AccessTokenProvider;
use crate::watch::{emit, WatchFuture, Watcher};

/// Future returned by [`SecretFetcher`] calls.
pub type SecretFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Reads the `latest` version of one secret.
///
/// Production code uses [`SecretManagerClient`]; tests script answers and
/// failures without a server.
pub trait SecretFetcher: Send + Sync {
    /// ETag of the latest version.
    fn latest_etag(&self) -> SecretFuture<'_>;

    /// Decoded payload of the latest version.
    fn access_latest(&self) -> SecretFuture<'_>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct SecretVersion {
    #[serde(default)]
    etag: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

/// REST client for `{secret_manager_url}/projects/{project}/secrets/{secret}/versions/latest`.
#[derive(Debug)]
pub struct SecretManagerClient {
    http: reqwest::Client,
    auth: AccessTokenProvider,
    version_url: String,
}

impl SecretManagerClient {
    pub fn new(
        http: reqwest::Client,
        auth: AccessTokenProvider,
        secret_manager_url: &str,
        project_id: &str,
        secret_name: &str,
    ) -> Self {
        let version_url = format!(
            "{}/projects/{project_id}/secrets/{secret_name}/versions/latest",
            secret_manager_url.trim_end_matches('/')
        );

        Self {
            http,
            auth,
            version_url,
        }
    }

    pub fn from_config(cfg: &GcpSecretsWatcherConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let auth = match &cfg.credentials_file {
            Some(path) => AccessTokenProvider::from_credentials_file(http.clone(), path)?,
            None => AccessTokenProvider::metadata(http.clone(), &cfg.metadata_url),
        };

        Ok(Self::new(
            http,
            auth,
            &cfg.secret_manager_url,
            &cfg.project_id,
            &cfg.secret_name,
        ))
    }

    pub fn version_url(&self) -> &str {
        &self.version_url
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let token = self.auth.token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(OverseerError::SecretManagerStatus(status));
        }
        Ok(response)
    }
}

impl SecretFetcher for SecretManagerClient {
    fn latest_etag(&self) -> SecretFuture<'_> {
        Box::pin(async move {
            let version: SecretVersion = self.get(&self.version_url).await?.json().await?;
            Ok(version.etag)
        })
    }

    fn access_latest(&self) -> SecretFuture<'_> {
        Box::pin(async move {
            let url = format!("{}:access", self.version_url);
            let access: AccessSecretVersionResponse = self.get(&url).await?.json().await?;

            let bytes = STANDARD.decode(access.payload.data.as_bytes()).map_err(|e| {
                OverseerError::InvalidSecretPayload(format!("payload is not valid base64: {e}"))
            })?;
            String::from_utf8(bytes).map_err(|e| {
                OverseerError::InvalidSecretPayload(format!("payload is not valid UTF-8: {e}"))
            })
        })
    }
}

/// Watches one secret and emits its value whenever the latest version's ETag changes.
pub struct GcpSecretsWatcher {
    fetcher: Box<dyn SecretFetcher>,
    secret: String,
    check_interval: Duration,
    error_wait: Duration,
    stop: CancellationToken,
    span: Span,
}

impl std::fmt::Debug for GcpSecretsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpSecretsWatcher")
            .field("secret", &self.secret)
            .field("check_interval", &self.check_interval)
            .field("error_wait", &self.error_wait)
            .finish_non_exhaustive()
    }
}

impl GcpSecretsWatcher {
    /// `secret` only labels log lines, e.g. `projects/p/secrets/s`.
    pub fn new(
        fetcher: impl SecretFetcher + 'static,
        secret: impl Into<String>,
        check_interval: Duration,
        error_wait: Duration,
        span: Span,
    ) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            secret: secret.into(),
            check_interval,
            error_wait,
            stop: CancellationToken::new(),
            span,
        }
    }

    pub fn from_config(cfg: &GcpSecretsWatcherConfig, span: Span) -> Result<Self> {
        let client = SecretManagerClient::from_config(cfg)?;
        span.in_scope(|| {
            info!(
                secrets_file_path = %cfg.secrets_file_path.display(),
                "secret destination"
            )
        });

        Ok(Self::new(
            client,
            format!("projects/{}/secrets/{}", cfg.project_id, cfg.secret_name),
            Duration::from_secs(cfg.check_interval_seconds),
            Duration::from_secs(cfg.secret_error_wait_seconds),
            span,
        ))
    }

    /// Run `fut` unless the watcher is stopped first.
    async fn until_stopped<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Sleep for `wait`. Returns `false` if stopped meanwhile.
    async fn pause(&self, wait: Duration) -> bool {
        self.until_stopped(tokio::time::sleep(wait)).await.is_some()
    }
}

impl Watcher for GcpSecretsWatcher {
    fn watch(&self, changes: mpsc::Sender<Change>) -> WatchFuture<'_> {
        Box::pin(
            async move {
                info!(secret = %self.secret, "starting watcher");
                let mut last_etag: Option<String> = None;

                loop {
                    let etag = match self.until_stopped(self.fetcher.latest_etag()).await {
                        None => break,
                        Some(Ok(etag)) => etag,
                        Some(Err(err)) => {
                            error!(secret = %self.secret, error = %err, "error getting secret etag");
                            if !self.pause(self.error_wait).await {
                                break;
                            }
                            continue;
                        }
                    };

                    if last_etag.as_deref() == Some(etag.as_str()) {
                        debug!(secret = %self.secret, %etag, "secret unchanged");
                    } else {
                        info!(
                            secret = %self.secret,
                            %etag,
                            previous_etag = last_etag.as_deref().unwrap_or(""),
                            "change detected"
                        );

                        let value = match self.until_stopped(self.fetcher.access_latest()).await {
                            None => break,
                            Some(Ok(value)) => value,
                            Some(Err(err)) => {
                                error!(secret = %self.secret, error = %err, "error accessing secret");
                                if !self.pause(self.error_wait).await {
                                    break;
                                }
                                continue;
                            }
                        };

                        if !emit(&changes, Change::Value(value), &self.stop).await {
                            break;
                        }
                        last_etag = Some(etag);
                    }

                    if !self.pause(self.check_interval).await {
                        break;
                    }
                }

                info!("watcher finished");
            }
            .instrument(self.span.clone()),
        )
    }

    fn stop(&self) {
        self.span.in_scope(|| info!("shutting down watcher"));
        self.stop.cancel();
    }
}
