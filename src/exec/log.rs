// src/exec/log.rs

use tracing::{info, Span};

use crate::config::LogExecutorConfig;
use crate::exec::{ExecuteFuture, Executor};
use crate::types::Change;

/// Logs every change it receives. Handy for checking a watcher's behaviour
/// before wiring it to a real command.
#[derive(Debug)]
pub struct LogExecutor {
    tag: String,
    span: Span,
}

impl LogExecutor {
    pub fn new(tag: impl Into<String>, span: Span) -> Self {
        Self {
            tag: tag.into(),
            span,
        }
    }

    pub fn from_config(cfg: &LogExecutorConfig, span: Span) -> Self {
        Self::new(cfg.tag.clone(), span)
    }
}

impl Executor for LogExecutor {
    fn execute(&self, change: Change) -> ExecuteFuture<'_> {
        Box::pin(async move {
            self.span
                .in_scope(|| info!(tag = %self.tag, data = %change, "received data"));
            Ok(())
        })
    }

    fn stop(&self) {
        self.span.in_scope(|| info!("shutting down executor"));
    }
}
