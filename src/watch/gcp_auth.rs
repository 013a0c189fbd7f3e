// src/watch/gcp_auth.rs

//! OAuth access tokens for Google APIs.
//!
//! Without a credentials file, tokens come from the default service account
//! on the GCE metadata server. With one, the file must hold `authorized_user`
//! credentials (as written by `gcloud auth application-default login`), and
//! its refresh token is exchanged at the token endpoint.
//!
//! Tokens are cached and refreshed a minute before they expire.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{OverseerError, Result};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum TokenSource {
    Metadata {
        url: String,
    },
    AuthorizedUser {
        token_uri: String,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

/// The subset of a Google credentials file we understand.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug)]
pub struct AccessTokenProvider {
    http: reqwest::Client,
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenProvider {
    /// Tokens for the instance's default service account.
    pub fn metadata(http: reqwest::Client, metadata_url: &str) -> Self {
        let url = format!(
            "{}/instance/service-accounts/default/token",
            metadata_url.trim_end_matches('/')
        );
        Self::with_source(http, TokenSource::Metadata { url })
    }

    /// Tokens minted from the `authorized_user` credentials at `path`.
    pub fn from_credentials_file(http: reqwest::Client, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading credentials file {path:?}"))?;
        let creds: CredentialsFile = serde_json::from_str(&raw).map_err(|e| {
            OverseerError::AuthError(format!("parsing credentials file {path:?}: {e}"))
        })?;

        if creds.kind != "authorized_user" {
            return Err(OverseerError::AuthError(format!(
                "credentials file {path:?} has type '{}', only 'authorized_user' is supported",
                creds.kind
            )));
        }

        let required = |name: &str, value: Option<String>| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                OverseerError::AuthError(format!("credentials file {path:?} is missing {name}"))
            })
        };

        let source = TokenSource::AuthorizedUser {
            client_id: required("client_id", creds.client_id)?,
            client_secret: required("client_secret", creds.client_secret)?,
            refresh_token: required("refresh_token", creds.refresh_token)?,
            token_uri: creds
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        };

        Ok(Self::with_source(http, source))
    }

    fn with_source(http: reqwest::Client, source: TokenSource) -> Self {
        Self {
            http,
            source,
            cached: Mutex::new(None),
        }
    }

    /// A valid bearer token, fetching a new one when the cached one is stale.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.request_token().await?;
        debug!(expires_in = fresh.expires_in, "fetched access token");

        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(fresh.access_token)
    }

    async fn request_token(&self) -> Result<TokenResponse> {
        let request = match &self.source {
            TokenSource::Metadata { url } => self.http.get(url).header("Metadata-Flavor", "Google"),
            TokenSource::AuthorizedUser {
                token_uri,
                client_id,
                client_secret,
                refresh_token,
            } => self.http.post(token_uri).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ]),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OverseerError::AuthError(format!(
                "token endpoint returned status {status}"
            )));
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}
