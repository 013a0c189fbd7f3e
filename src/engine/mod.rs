// src/engine/mod.rs

//! Pipeline engine.
//!
//! - [`overseer`] binds one watcher to one executor and owns the dispatch
//!   loop plus the ordered shutdown of a single pipeline.
//! - [`manager`] owns every overseer of the process and stops them together.

pub mod manager;
pub mod overseer;

pub use manager::Manager;
pub use overseer::{Overseer, OverseerState, Pipeline};
