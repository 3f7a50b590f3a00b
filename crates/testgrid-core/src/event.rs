//! Progress events emitted while a matrix run executes.

use serde::{Deserialize, Serialize};

use crate::BrowserSpec;

/// A progress notification from a matrix run.
///
/// `JobStarted` and `JobCompleted` fire once per job, in each job's own
/// completion order. `TestCompleted` fires exactly once, last, and only
/// when the run produced an aggregate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProgressEvent {
    /// A job was accepted by the execution service.
    #[serde(rename_all = "camelCase")]
    JobStarted {
        /// Size of the browser × URL matrix.
        total_jobs: usize,
        /// Jobs started so far, including this one.
        started_jobs: usize,
    },

    /// A job finished and received its verdict.
    #[serde(rename_all = "camelCase")]
    JobCompleted {
        url: String,
        platform: BrowserSpec,
        passed: bool,
        tunnel_id: Option<String>,
    },

    /// Every job settled; carries the aggregate verdict.
    TestCompleted { passed: bool },
}

impl ProgressEvent {
    /// Short name of the event, as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "jobStarted",
            Self::JobCompleted { .. } => "jobCompleted",
            Self::TestCompleted { .. } => "testCompleted",
        }
    }
}
