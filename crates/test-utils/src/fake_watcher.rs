use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use overseer::watch::{emit, WatchFuture, Watcher};
use overseer::Change;

/// A fake watcher that emits a fixed list of changes (optionally spaced by
/// `interval`) and then idles until stopped, like a real watcher that has
/// nothing new to report.
pub struct ScriptedWatcher {
    script: Mutex<Vec<Change>>,
    interval: Duration,
    stop: CancellationToken,
    sent: AtomicUsize,
    returned: AtomicBool,
}

impl ScriptedWatcher {
    pub fn new(script: Vec<Change>) -> Self {
        Self::with_interval(script, Duration::ZERO)
    }

    pub fn with_interval(script: Vec<Change>, interval: Duration) -> Self {
        Self {
            script: Mutex::new(script),
            interval,
            stop: CancellationToken::new(),
            sent: AtomicUsize::new(0),
            returned: AtomicBool::new(false),
        }
    }

    /// Number of changes accepted by the channel so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    /// Whether `watch` has returned.
    pub fn returned(&self) -> bool {
        self.returned.load(Ordering::SeqCst)
    }
}

impl Watcher for ScriptedWatcher {
    fn watch(&self, changes: mpsc::Sender<Change>) -> WatchFuture<'_> {
        Box::pin(async move {
            let script = std::mem::take(&mut *self.script.lock().unwrap());

            let mut stopped = false;
            for change in script {
                if !self.interval.is_zero() {
                    tokio::select! {
                        _ = self.stop.cancelled() => {
                            stopped = true;
                            break;
                        }
                        _ = tokio::time::sleep(self.interval) => {}
                    }
                }
                if !emit(&changes, change, &self.stop).await {
                    stopped = true;
                    break;
                }
                self.sent.fetch_add(1, Ordering::SeqCst);
            }

            if !stopped {
                self.stop.cancelled().await;
            }
            self.returned.store(true, Ordering::SeqCst);
        })
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}
