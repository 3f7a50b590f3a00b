//! Throttled execution of browser × URL test matrices.
//!
//! A [`TestRunner`] expands the configured browsers and URLs into one
//! [`Job`] per combination, pushes them through a [`Scheduler`] that caps
//! how many run at once, and folds every job's verdict into one aggregate.

pub mod config;
pub mod error;
pub mod hooks;
pub mod job;
pub mod runner;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AbortPolicy, ConfigError, LateEvents, RunnerConfig};
pub use error::{HookError, JobError, RunnerError};
pub use hooks::{ChannelSink, ProgressSink, ResultHook, TracingSink};
pub use job::{Job, JobResult};
pub use runner::TestRunner;
pub use scheduler::Scheduler;
