//! Core domain errors.

use thiserror::Error;

use crate::JobState;

/// Core domain errors for testgrid.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid job lifecycle transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: JobState, to: JobState },

    /// No evaluator registered for the framework.
    #[error("No evaluator registered for framework '{0}'")]
    UnknownFramework(String),

    /// The raw result does not have the shape the framework's evaluator expects.
    #[error("Malformed '{framework}' result: {message}")]
    MalformedResult { framework: String, message: String },
}
