//! Job and runner errors.

use thiserror::Error;

use testgrid_client::ClientError;
use testgrid_core::{BrowserSpec, CoreError, JobRef, TaskRef};

/// Error type returned by a failing [`ResultHook`](crate::ResultHook).
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal conditions that end a job in the `Errored` state.
///
/// A failing test is not an error: it is a completed job with a `false`
/// verdict.
#[derive(Debug, Error)]
pub enum JobError {
    /// The submission request failed.
    #[error("failed to submit job: {0}")]
    Submit(#[source] ClientError),

    /// The service accepted the submission but assigned no task.
    #[error("failed to submit job: service returned no task references: {body}")]
    NoTaskReference { body: String },

    /// A status request failed.
    #[error("failed to poll job status: {0}")]
    Poll(#[source] ClientError),

    /// The status response did not mention the polled task.
    #[error("failed to poll job status: no entry for task {task_ref}")]
    MissingTaskStatus { task_ref: TaskRef },

    /// The service completed the task in its execution-error state.
    #[error(
        "remote execution error for task {task_ref} (job {})",
        .job_ref.as_ref().map_or("unknown", JobRef::as_str)
    )]
    RemoteError {
        task_ref: TaskRef,
        job_ref: Option<JobRef>,
    },

    /// The raw result could not be turned into a verdict.
    #[error("failed to evaluate result: {0}")]
    Evaluation(#[source] CoreError),

    /// The result post-processing hook failed.
    #[error("result hook failed: {0}")]
    Hook(#[source] HookError),

    /// The run's cancellation signal fired before submission or while polling.
    #[error("job cancelled")]
    Cancelled,

    /// The job was driven out of order (e.g., polled before starting).
    #[error("job lifecycle error: {0}")]
    State(#[source] CoreError),
}

/// Errors that abort a whole test run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// One job failed fatally.
    #[error("job for {url} on {platform} failed: {source}")]
    Job {
        url: String,
        platform: BrowserSpec,
        #[source]
        source: JobError,
    },

    /// A job task panicked.
    #[error("job task panicked: {0}")]
    TaskPanicked(String),
}

impl RunnerError {
    /// The underlying job error, if this run failed because of one.
    pub fn job_error(&self) -> Option<&JobError> {
        match self {
            Self::Job { source, .. } => Some(source),
            Self::TaskPanicked(_) => None,
        }
    }
}
