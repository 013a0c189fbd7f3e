// src/watch/metadata.rs

//! Long-poll watcher for the GCE metadata server.
//!
//! Each request carries `wait_for_change=true` and, once known, the last seen
//! ETag as `last_etag`. The server holds the request open until the value no
//! longer matches that ETag, so a change that lands between two polls is still
//! reported on the next one. Only the ETag is remembered between polls, never
//! the value.
//!
//! Failed requests are logged and retried after a fixed wait so a broken
//! server is not hammered in a tight loop. Stopping the watcher drops the
//! in-flight request immediately instead of waiting for the server to answer.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::ETAG;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument, Span};

use crate::config::{GceMetadataWatcherConfig, MetadataSource};
use crate::errors::{OverseerError, Result};
use crate::types::Change;
use crate::watch::{emit, WatchFuture, Watcher};

/// One answer from the metadata server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataValue {
    pub etag: String,
    pub body: String,
}

/// Performs a single conditional long-poll.
///
/// Production code uses [`GceMetadataClient`]; tests can script answers and
/// failures without a server.
pub trait MetadataFetcher: Send + Sync {
    /// Block until the value differs from `last_etag` (or until the next
    /// change when `None`) and return it.
    fn fetch<'a>(
        &'a self,
        last_etag: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<MetadataValue>> + Send + 'a>>;
}

/// HTTP client for `{metadata_url}/{source}/{key}`.
#[derive(Debug, Clone)]
pub struct GceMetadataClient {
    http: reqwest::Client,
    url: String,
    recursive: bool,
}

impl GceMetadataClient {
    pub fn new(
        metadata_url: &str,
        source: MetadataSource,
        key: &str,
        recursive: bool,
    ) -> Result<Self> {
        // No request timeout: a long-poll may legitimately block for a long time.
        let http = reqwest::Client::builder().build()?;
        let url = format!(
            "{}/{}/{}",
            metadata_url.trim_end_matches('/'),
            source,
            key.trim_start_matches('/')
        );

        Ok(Self {
            http,
            url,
            recursive,
        })
    }

    pub fn from_config(cfg: &GceMetadataWatcherConfig) -> Result<Self> {
        Self::new(&cfg.metadata_url, cfg.source, &cfg.key, cfg.recursive)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl MetadataFetcher for GceMetadataClient {
    fn fetch<'a>(
        &'a self,
        last_etag: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<MetadataValue>> + Send + 'a>> {
        Box::pin(async move {
            let recursive = if self.recursive { "true" } else { "false" };
            let mut request = self
                .http
                .get(&self.url)
                .header("Metadata-Flavor", "Google")
                .query(&[("wait_for_change", "true"), ("recursive", recursive)]);

            if let Some(etag) = last_etag {
                request = request.query(&[("last_etag", etag)]);
            }

            let response = request.send().await?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(OverseerError::MetadataStatus(status));
            }

            let etag = response
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let body = response.text().await?;

            Ok(MetadataValue { etag, body })
        })
    }
}

/// Default wait between failed requests.
pub const DEFAULT_ERROR_WAIT: Duration = Duration::from_secs(1);

/// Watches a single metadata key and emits its value on every ETag change.
pub struct GceMetadataWatcher {
    fetcher: Box<dyn MetadataFetcher>,
    key: String,
    error_wait: Duration,
    stop: CancellationToken,
    span: Span,
}

impl std::fmt::Debug for GceMetadataWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GceMetadataWatcher")
            .field("key", &self.key)
            .field("error_wait", &self.error_wait)
            .finish_non_exhaustive()
    }
}

impl GceMetadataWatcher {
    pub fn new(
        fetcher: impl MetadataFetcher + 'static,
        key: impl Into<String>,
        error_wait: Duration,
        span: Span,
    ) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            key: key.into(),
            error_wait,
            stop: CancellationToken::new(),
            span,
        }
    }

    pub fn from_config(cfg: &GceMetadataWatcherConfig, span: Span) -> Result<Self> {
        let client = GceMetadataClient::from_config(cfg)?;
        Ok(Self::new(
            client,
            cfg.key.clone(),
            Duration::from_secs(cfg.metadata_error_wait_seconds),
            span,
        ))
    }
}

impl Watcher for GceMetadataWatcher {
    fn watch(&self, changes: mpsc::Sender<Change>) -> WatchFuture<'_> {
        Box::pin(
            async move {
                info!(key = %self.key, "starting watcher");
                let mut last_etag: Option<String> = None;

                loop {
                    let result = tokio::select! {
                        biased;
                        _ = self.stop.cancelled() => break,
                        res = self.fetcher.fetch(last_etag.as_deref()) => res,
                    };

                    let value = match result {
                        Ok(value) => value,
                        Err(err) => {
                            // A request torn down by stop is shutdown, not a fault.
                            if self.stop.is_cancelled() {
                                break;
                            }

                            error!(key = %self.key, error = %err, "error getting metadata");

                            tokio::select! {
                                _ = self.stop.cancelled() => break,
                                _ = tokio::time::sleep(self.error_wait) => {}
                            }
                            continue;
                        }
                    };

                    if last_etag.as_deref() == Some(value.etag.as_str()) {
                        debug!(key = %self.key, etag = %value.etag, "metadata unchanged");
                        continue;
                    }

                    info!(
                        key = %self.key,
                        etag = %value.etag,
                        previous_etag = last_etag.as_deref().unwrap_or(""),
                        "change detected"
                    );

                    if !emit(&changes, Change::Value(value.body), &self.stop).await {
                        break;
                    }
                    last_etag = Some(value.etag);
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
