// src/watch/ticker.rs

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument, Span};

use crate::config::TimeWatcherConfig;
use crate::types::Change;
use crate::watch::{emit, WatchFuture, Watcher};

/// Emits the current time every `interval`.
#[derive(Debug)]
pub struct TimeWatcher {
    interval: Duration,
    stop: CancellationToken,
    span: Span,
}

impl TimeWatcher {
    pub fn new(interval: Duration, span: Span) -> Self {
        Self {
            interval,
            stop: CancellationToken::new(),
            span,
        }
    }

    pub fn from_config(cfg: &TimeWatcherConfig, span: Span) -> Self {
        Self::new(Duration::from_secs(cfg.poll_seconds), span)
    }
}

impl Watcher for TimeWatcher {
    fn watch(&self, changes: mpsc::Sender<Change>) -> WatchFuture<'_> {
        Box::pin(
            async move {
                info!(interval_ms = self.interval.as_millis() as u64, "starting watcher");

                loop {
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = tokio::time::sleep(self.interval) => {
                            let now = Utc::now();
                            info!(value = %now, "time watcher tick");
                            if !emit(&changes, Change::Tick(now), &self.stop).await {
                                break;
                            }
                        }
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
