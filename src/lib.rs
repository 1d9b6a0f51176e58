//! procpeek - per-process resource sampler
//!
//! Samples CPU, memory and disk I/O of named processes at a fixed interval and
//! appends the samples to an append-only CSV log, one run id per execution.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod inspector;
pub mod internal_metrics;
pub mod listener;
pub mod locator;
pub mod persister;
pub mod queue;
pub mod sampler;
pub mod sequence;
pub mod shutdown;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
