//! Caller-supplied hooks: progress sinks and result post-processing.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use testgrid_core::ProgressEvent;

use crate::error::HookError;
use crate::job::JobResult;

/// Receives progress events synchronously as they occur.
///
/// Called from job tasks; implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Post-processes a completed job's result.
///
/// Receives its own copy of the result. Returning `Some(verdict)`
/// overrides the evaluator's verdict, `None` keeps it. An error fails
/// the job.
#[async_trait]
pub trait ResultHook: Send + Sync {
    async fn on_result(&self, result: JobResult) -> Result<Option<bool>, HookError>;
}

/// A sink that forwards every event into an unbounded channel.
///
/// # Example
///
/// ```rust,no_run
/// use testgrid_runner::ChannelSink;
///
/// let (sink, mut rx) = ChannelSink::new();
///
/// tokio::spawn(async move {
///     while let Some(event) = rx.recv().await {
///         println!("{:?}", event);
///     }
/// });
///
/// // Pass `sink` to TestRunner::with_progress_sink
/// ```
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    /// Create a new sink and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: &ProgressEvent) {
        // Receiver might be dropped
        self.tx.send(event.clone()).ok();
    }
}

/// A sink that logs every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::JobStarted {
                total_jobs,
                started_jobs,
            } => {
                info!(started_jobs, total_jobs, "Job started");
            }
            ProgressEvent::JobCompleted {
                url,
                platform,
                passed,
                tunnel_id,
            } => {
                info!(
                    url = %url,
                    platform = %platform,
                    passed,
                    tunnel_id = ?tunnel_id,
                    "Job completed"
                );
            }
            ProgressEvent::TestCompleted { passed } => {
                info!(passed, "Test run completed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new();

        sink.emit(&ProgressEvent::TestCompleted { passed: true });

        let received = rx.try_recv().unwrap();
        assert_eq!(received, ProgressEvent::TestCompleted { passed: true });
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(&ProgressEvent::TestCompleted { passed: false });
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let sink = move |event: &ProgressEvent| recorder.lock().unwrap().push(event.name());

        sink.emit(&ProgressEvent::JobStarted {
            total_jobs: 1,
            started_jobs: 1,
        });
        TracingSink.emit(&ProgressEvent::TestCompleted { passed: true });

        assert_eq!(*seen.lock().unwrap(), vec!["jobStarted"]);
    }
}
