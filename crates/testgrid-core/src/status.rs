//! Job lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreError;

/// Lifecycle of one remote job.
///
/// `Created → Starting → Started → Polling → Completed | Errored`.
/// `Starting` may also fail straight to `Errored`. Transitions are
/// monotonic; `Completed` and `Errored` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Job constructed, nothing submitted yet.
    #[default]
    Created,
    /// Submission request in flight.
    Starting,
    /// Service accepted the job and assigned a task reference.
    Started,
    /// Waiting for the service to report completion.
    Polling,
    /// Service reported a completed, evaluable result.
    Completed,
    /// Submission, polling, or evaluation failed.
    Errored,
}

impl JobState {
    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Starting)
                | (Starting, Started)
                | (Starting, Errored)
                | (Started, Polling)
                | (Polling, Completed)
                | (Polling, Errored)
        )
    }

    /// Validate and return the successor state.
    pub fn transition(self, next: JobState) -> Result<JobState, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStateTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Created => "created",
            JobState::Starting => "starting",
            JobState::Started => "started",
            JobState::Polling => "polling",
            JobState::Completed => "completed",
            JobState::Errored => "errored",
        };
        write!(f, "{}", s)
    }
}
