// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The overseer talks to an `Executor` instead of spawning processes itself.
//! Production pipelines use [`super::CommandExecutor`] or
//! [`super::LogExecutor`]; tests can provide their own implementation that,
//! for example, records which payloads it received.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::Change;

/// Future returned by [`Executor::execute`].
pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Action performed for every change a pipeline receives.
pub trait Executor: Send + Sync {
    /// Run the action for one change to completion (or until stopped).
    ///
    /// The overseer calls this from its own task per change, so several
    /// calls may be in flight at once. An error is logged by the caller and
    /// never stops the pipeline. Being stopped is not an error: an aborted
    /// run returns `Ok(())`.
    fn execute(&self, change: Change) -> ExecuteFuture<'_>;

    /// Abort in-flight runs promptly. Safe to call while `execute` is running
    /// and more than once.
    fn stop(&self);
}
