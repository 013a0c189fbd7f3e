// src/engine/overseer.rs

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::exec::Executor;
use crate::types::Change;
use crate::watch::Watcher;

/// Everything an overseer is built from. Immutable once handed over.
pub struct Pipeline {
    /// Display name, used to correlate log lines.
    pub name: String,
    /// Capacity of the change channel (>= 1).
    pub change_buffer: usize,
    pub watcher: Arc<dyn Watcher>,
    pub executor: Arc<dyn Executor>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("change_buffer", &self.change_buffer)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of an [`Overseer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverseerState {
    /// Built, `run` not called yet.
    Idle,
    /// Watcher running, changes being dispatched.
    Running,
    /// Stop requested; waiting for the watcher and in-flight executions.
    Draining,
    /// Fully shut down. Terminal.
    Stopped,
}

/// Binds one watcher to one executor through a bounded channel.
///
/// `run` starts the watcher on its own task and dispatches every change to
/// the executor on a task of its own, so executions may overlap and finish
/// out of order. On stop, the watcher and executor are told to stop, every
/// tracked task (watcher pump and executions) is awaited, and only then is
/// the channel closed.
pub struct Overseer {
    name: String,
    change_buffer: usize,
    watcher: Arc<dyn Watcher>,
    executor: Arc<dyn Executor>,
    state: Mutex<OverseerState>,
    /// Pipeline stop signal; a child of the manager's token.
    stop: CancellationToken,
    /// Fired once the overseer reached `Stopped`.
    drained: CancellationToken,
    tasks: TaskTracker,
    span: Span,
}

impl fmt::Debug for Overseer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overseer")
            .field("name", &self.name)
            .field("change_buffer", &self.change_buffer)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Overseer {
    /// Build an overseer that also stops when `parent_stop` is cancelled.
    pub fn new(pipeline: Pipeline, parent_stop: &CancellationToken) -> Self {
        let span = info_span!("overseer", overseer = %pipeline.name);
        Self {
            name: pipeline.name,
            change_buffer: pipeline.change_buffer.max(1),
            watcher: pipeline.watcher,
            executor: pipeline.executor,
            state: Mutex::new(OverseerState::Idle),
            stop: parent_stop.child_token(),
            drained: CancellationToken::new(),
            tasks: TaskTracker::new(),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> OverseerState {
        *self.state_guard()
    }

    /// Run until stopped, then drain.
    ///
    /// Returns once the overseer is fully stopped. Calling `run` on an
    /// overseer that is not idle returns immediately.
    pub async fn run(&self) {
        {
            let mut state = self.state_guard();
            if *state != OverseerState::Idle {
                let current = *state;
                drop(state);
                self.span
                    .in_scope(|| warn!(state = ?current, "run called on an overseer that is not idle"));
                return;
            }
            *state = OverseerState::Running;
        }

        let (tx, mut rx) = mpsc::channel::<Change>(self.change_buffer);

        let watcher = Arc::clone(&self.watcher);
        self.tasks.spawn(
            async move {
                watcher.watch(tx).await;
            }
            .instrument(self.span.clone()),
        );

        async {
            info!(change_buffer = self.change_buffer, "overseer running");
            self.dispatch(&mut rx).await;
            self.drain(rx).await;
        }
        .instrument(self.span.clone())
        .await;
    }

    /// Request shutdown and wait until every in-flight execution finished.
    ///
    /// Safe to call more than once and from several tasks; every caller
    /// returns once the overseer is stopped.
    pub async fn stop(&self) {
        self.stop.cancel();

        let never_ran = {
            let mut state = self.state_guard();
            if *state == OverseerState::Idle {
                *state = OverseerState::Stopped;
                true
            } else {
                false
            }
        };

        if never_ran {
            self.watcher.stop();
            self.executor.stop();
            self.drained.cancel();
        }

        self.drained.cancelled().await;
    }

    async fn dispatch(&self, rx: &mut mpsc::Receiver<Change>) {
        let mut watcher_done = false;

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                change = rx.recv(), if !watcher_done => match change {
                    Some(change) => self.spawn_execution(change),
                    None => {
                        warn!("watcher returned on its own; waiting for stop");
                        watcher_done = true;
                    }
                },
            }
        }
    }

    fn spawn_execution(&self, change: Change) {
        debug!(change = %change, "dispatching change");

        let executor = Arc::clone(&self.executor);
        self.tasks.spawn(
            async move {
                if let Err(err) = executor.execute(change).await {
                    error!(error = %err, "error running executor");
                }
            }
            .instrument(self.span.clone()),
        );
    }

    async fn drain(&self, rx: mpsc::Receiver<Change>) {
        self.set_state(OverseerState::Draining);
        info!("shutting down overseer");

        self.watcher.stop();
        self.executor.stop();

        info!("waiting for overseer to finish");
        self.tasks.close();
        self.tasks.wait().await;

        // Nothing can send any more: the watcher pump has returned.
        let mut rx = rx;
        rx.close();
        drop(rx);

        self.set_state(OverseerState::Stopped);
        info!("done");
        self.drained.cancel();
    }

    fn set_state(&self, next: OverseerState) {
        *self.state_guard() = next;
    }

    fn state_guard(&self) -> MutexGuard<'_, OverseerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
