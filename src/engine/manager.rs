// src/engine/manager.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::OverseerConfig;
use crate::engine::Overseer;
use crate::errors::{OverseerError, Result};
use crate::registry::Registry;

/// Owns every pipeline of the process.
///
/// All overseers share one stop token: [`Manager::stop`] cancels it and
/// waits for each of them to drain.
#[derive(Debug)]
pub struct Manager {
    configs: Vec<OverseerConfig>,
    stop: CancellationToken,
    tasks: TaskTracker,
    started: AtomicBool,
}

impl Manager {
    pub fn new(configs: Vec<OverseerConfig>) -> Self {
        Self {
            configs,
            stop: CancellationToken::new(),
            tasks: TaskTracker::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Build every pipeline through `registry`, then start them all.
    ///
    /// If any pipeline fails to build, nothing is started and that error is
    /// returned. Returns as soon as the overseers are spawned; must be called
    /// from within a Tokio runtime.
    pub fn run(&self, registry: &Registry) -> Result<()> {
        if self.stop.is_cancelled() {
            return Err(OverseerError::AlreadyStopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(OverseerError::AlreadyRunning);
        }

        let pipelines = match self
            .configs
            .iter()
            .map(|cfg| registry.build_pipeline(cfg))
            .collect::<Result<Vec<_>>>()
        {
            Ok(pipelines) => pipelines,
            Err(err) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        for pipeline in pipelines {
            let overseer = Arc::new(Overseer::new(pipeline, &self.stop));
            self.tasks.spawn(async move {
                overseer.run().await;
            });
        }

        info!(count = self.configs.len(), "overseers started");
        Ok(())
    }

    /// Stop every overseer and wait until all of them drained.
    pub async fn stop(&self) {
        info!("stopping overseers");
        self.stop.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        info!("all overseers stopped");
    }
}
