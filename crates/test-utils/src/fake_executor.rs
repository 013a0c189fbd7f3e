use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use overseer::errors::OverseerError;
use overseer::exec::{ExecuteFuture, Executor};
use overseer::Change;

/// A fake executor that:
/// - records every change it receives
/// - optionally takes `delay` to "run" (ignoring stop, like a command that
///   cannot be interrupted)
/// - counts how many executions finished.
#[derive(Default)]
pub struct RecordingExecutor {
    received: Mutex<Vec<Change>>,
    completed: AtomicUsize,
    stopped: AtomicBool,
    delay: Duration,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn received(&self) -> Vec<Change> {
        self.received.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, change: Change) -> ExecuteFuture<'_> {
        Box::pin(async move {
            self.received.lock().unwrap().push(change);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// A fake executor whose every run fails.
#[derive(Default)]
pub struct FailingExecutor {
    calls: AtomicUsize,
}

impl FailingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Executor for FailingExecutor {
    fn execute(&self, _change: Change) -> ExecuteFuture<'_> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OverseerError::CommandFailed("scripted failure".to_string()))
        })
    }

    fn stop(&self) {}
}
