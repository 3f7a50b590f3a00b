//! testgrid Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime specifics
//!
//! Everything here describes one browser test matrix run: what gets
//! executed, the lifecycle a remote job moves through, the progress
//! events a run emits, and how framework results become verdicts.

pub mod browser;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod ids;
pub mod status;

// Re-export commonly used types
pub use browser::{BrowserSpec, TaskDescriptor};
pub use error::CoreError;
pub use evaluator::{BuiltinEvaluator, EvaluatorRegistry, ResultEvaluator};
pub use event::ProgressEvent;
pub use ids::{JobRef, RunId, TaskRef};
pub use status::JobState;
