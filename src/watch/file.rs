// src/watch/file.rs

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument, Span};

use crate::config::FileWatcherConfig;
use crate::types::Change;
use crate::watch::{emit, WatchFuture, Watcher};

/// Polls the modification time of a single file and emits its path whenever
/// the time moves past the last one seen.
///
/// The baseline is the construction time, so a file that is older than the
/// daemon does not trigger a run at startup.
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    poll_interval: Duration,
    baseline: SystemTime,
    stop: CancellationToken,
    span: Span,
}

impl FileWatcher {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration, span: Span) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            baseline: SystemTime::now(),
            stop: CancellationToken::new(),
            span,
        }
    }

    pub fn from_config(cfg: &FileWatcherConfig, span: Span) -> Self {
        Self::new(cfg.path.clone(), Duration::from_secs(cfg.poll_seconds), span)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Watcher for FileWatcher {
    fn watch(&self, changes: mpsc::Sender<Change>) -> WatchFuture<'_> {
        Box::pin(
            async move {
                info!(path = %self.path.display(), "starting watcher");
                let mut last_modified = self.baseline;

                loop {
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }

                    let modified = match tokio::fs::metadata(&self.path)
                        .await
                        .and_then(|meta| meta.modified())
                    {
                        Ok(modified) => modified,
                        Err(err) => {
                            error!(path = %self.path.display(), error = %err, "error getting file info");
                            continue;
                        }
                    };

                    if modified <= last_modified {
                        debug!(path = %self.path.display(), "file unchanged");
                        continue;
                    }

                    info!(path = %self.path.display(), "file changed");
                    last_modified = modified;

                    if !emit(&changes, Change::Path(self.path.clone()), &self.stop).await {
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
