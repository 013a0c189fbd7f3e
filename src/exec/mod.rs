// src/exec/mod.rs

//! Action execution layer.
//!
//! - [`backend`] provides the `Executor` trait the overseer dispatches to.
//! - [`command`] runs a shell command with the change staged on disk.
//! - [`log`] just logs each change.

pub mod backend;
pub mod command;
pub mod log;

pub use backend::{ExecuteFuture, Executor};
pub use command::{CommandExecutor, DATA_ENV_VAR};
pub use log::LogExecutor;
