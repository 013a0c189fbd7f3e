// src/watch/mod.rs

//! Change detection.
//!
//! A [`Watcher`] turns "something changed" in the outside world into
//! [`Change`] values pushed onto the overseer's bounded channel:
//!
//! - [`ticker`] fires on a fixed interval (mostly useful for testing wiring).
//! - [`file`] polls the modification time of one file.
//! - [`metadata`] long-polls a key on the GCE metadata server.
//! - [`gcp_secrets`] polls a secret in GCP Secret Manager.
//!
//! Watchers never close the channel. They drop their sender when `watch`
//! returns, and only the owning overseer decides when the receiving side
//! goes away.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::Change;

pub mod file;
pub mod gcp_auth;
pub mod gcp_secrets;
pub mod metadata;
pub mod ticker;

pub use file::FileWatcher;
pub use gcp_auth::AccessTokenProvider;
pub use gcp_secrets::{GcpSecretsWatcher, SecretFetcher, SecretFuture, SecretManagerClient};
pub use metadata::{GceMetadataClient, GceMetadataWatcher, MetadataFetcher, MetadataValue};
pub use ticker::TimeWatcher;

/// Future returned by [`Watcher::watch`].
pub type WatchFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Source of changes for one pipeline.
pub trait Watcher: Send + Sync {
    /// Detect changes until stopped, sending each one on `changes`.
    ///
    /// Sending waits for channel capacity; this is the only backpressure in
    /// the pipeline and changes are never dropped to make room.
    fn watch(&self, changes: mpsc::Sender<Change>) -> WatchFuture<'_>;

    /// Ask `watch` to return as soon as possible. Idempotent; does not wait.
    fn stop(&self);
}

/// Send `change`, waiting for capacity unless `stop` fires first.
///
/// Returns `false` when the caller should return from `watch`: either the
/// watcher was stopped while parked on a full channel, or the receiving side
/// is gone.
pub async fn emit(
    changes: &mpsc::Sender<Change>,
    change: Change,
    stop: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = stop.cancelled() => false,
        res = changes.send(change) => res.is_ok(),
    }
}
