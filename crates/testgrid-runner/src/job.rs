//! Lifecycle of one remote test execution.
//!
//! A [`Job`] submits one browser × URL combination to the execution
//! service, polls at a fixed interval until the service reports it
//! finished, classifies the terminal state and evaluates the framework
//! result into a verdict.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use testgrid_client::{ExecutionService, SubmitRequest};
use testgrid_core::{
    BrowserSpec, CoreError, EvaluatorRegistry, JobRef, JobState, TaskDescriptor, TaskRef,
};

use crate::config::RunnerConfig;
use crate::error::JobError;

/// Outcome of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Task reference the job was polled under.
    pub task_ref: TaskRef,
    /// Finished execution record, if the service assigned one.
    pub job_ref: Option<JobRef>,
    /// Test page URL.
    pub url: String,
    /// Browser the job was requested on.
    pub platform: BrowserSpec,
    /// Framework-specific raw result.
    pub raw: Value,
    /// Verdict derived from `raw`.
    pub passed: bool,
    /// When the service accepted the job.
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the service reported completion.
    pub completed_at: DateTime<Utc>,
}

/// One remote execution, driven through its lifecycle.
///
/// Created fresh for every task descriptor and never reused.
pub struct Job {
    config: Arc<RunnerConfig>,
    descriptor: TaskDescriptor,
    service: Arc<dyn ExecutionService>,
    evaluators: Arc<EvaluatorRegistry>,
    cancel: CancellationToken,
    state: JobState,
    task_ref: Option<TaskRef>,
    job_ref: Option<JobRef>,
    submitted_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new Job.
    pub fn new(
        config: Arc<RunnerConfig>,
        descriptor: TaskDescriptor,
        service: Arc<dyn ExecutionService>,
        evaluators: Arc<EvaluatorRegistry>,
    ) -> Self {
        Self {
            config,
            descriptor,
            service,
            evaluators,
            cancel: CancellationToken::new(),
            state: JobState::Created,
            task_ref: None,
            job_ref: None,
            submitted_at: None,
        }
    }

    /// Builder method to make polling stop when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    /// Task reference assigned on submission.
    pub fn task_ref(&self) -> Option<&TaskRef> {
        self.task_ref.as_ref()
    }

    /// Job reference assigned on completion.
    pub fn job_ref(&self) -> Option<&JobRef> {
        self.job_ref.as_ref()
    }

    /// Tunnel the job runs through, if tunneling is on.
    pub fn tunnel_id(&self) -> Option<&str> {
        self.config.active_tunnel()
    }

    /// The submission request for this job.
    pub fn submit_request(&self) -> SubmitRequest {
        SubmitRequest {
            platforms: vec![self.descriptor.browser().platform_triple()],
            url: self.descriptor.url().to_string(),
            framework: self.config.framework.clone(),
            build: self.config.build.clone(),
            name: self.config.name.clone(),
            tunnel_identifier: self.tunnel_id().map(str::to_string),
            extra: self.config.extra_options.clone(),
        }
    }

    fn advance(&mut self, next: JobState) -> Result<(), JobError> {
        self.state = self.state.transition(next).map_err(JobError::State)?;
        Ok(())
    }

    fn fail(&mut self, error: JobError) -> JobError {
        warn!(
            url = %self.descriptor.url(),
            platform = %self.descriptor.browser(),
            from = %self.state,
            error = %error,
            "Job errored"
        );
        self.state = JobState::Errored;
        error
    }

    /// Submit the job to the execution service.
    ///
    /// On success the job is `Started` and holds the first task reference
    /// the service returned. A job whose cancellation token already fired
    /// fails without contacting the service.
    pub async fn start(&mut self) -> Result<TaskRef, JobError> {
        self.advance(JobState::Starting)?;
        if self.cancel.is_cancelled() {
            return Err(self.fail(JobError::Cancelled));
        }

        let request = self.submit_request();
        info!(
            url = %request.url,
            platform = %self.descriptor.browser(),
            framework = %request.framework,
            "Starting job"
        );

        let response = match self.service.submit(&request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(JobError::Submit(e))),
        };

        let Some(task_ref) = response.task_refs.into_iter().next() else {
            return Err(self.fail(JobError::NoTaskReference {
                body: response.body,
            }));
        };

        self.advance(JobState::Started)?;
        self.task_ref = Some(task_ref.clone());
        self.submitted_at = Some(Utc::now());
        info!(task_ref = %task_ref, url = %request.url, "Job started");

        Ok(task_ref)
    }

    /// Poll until the service reports the job finished, then evaluate it.
    pub async fn get_result(&mut self) -> Result<JobResult, JobError> {
        // Only a started job holds a task reference.
        let Some(task_ref) = self.task_ref.clone() else {
            return Err(JobError::State(CoreError::InvalidStateTransition {
                from: self.state,
                to: JobState::Polling,
            }));
        };
        self.advance(JobState::Polling)?;

        match self.poll_to_completion(&task_ref).await {
            Ok(result) => {
                self.job_ref = result.job_ref.clone();
                self.advance(JobState::Completed)?;
                info!(
                    task_ref = %task_ref,
                    job_ref = ?result.job_ref,
                    passed = result.passed,
                    "Job completed"
                );
                Ok(result)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn poll_to_completion(&self, task_ref: &TaskRef) -> Result<JobResult, JobError> {
        let interval = self.config.poll_interval();
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            let response = self
                .service
                .status(std::slice::from_ref(task_ref))
                .await
                .map_err(JobError::Poll)?;

            if response.completed {
                let status = response
                    .task(task_ref)
                    .ok_or_else(|| JobError::MissingTaskStatus {
                        task_ref: task_ref.clone(),
                    })?;

                if status.is_remote_error() {
                    return Err(JobError::RemoteError {
                        task_ref: task_ref.clone(),
                        job_ref: status.job_id.clone(),
                    });
                }

                let raw = status.result.clone().unwrap_or(Value::Null);
                let passed = self
                    .evaluators
                    .evaluate(&self.config.framework, &raw)
                    .map_err(JobError::Evaluation)?;

                return Ok(JobResult {
                    task_ref: task_ref.clone(),
                    job_ref: status.job_id.clone(),
                    url: self.descriptor.url().to_string(),
                    platform: self.descriptor.browser().clone(),
                    raw,
                    passed,
                    submitted_at: self.submitted_at,
                    completed_at: Utc::now(),
                });
            }

            debug!(
                task_ref = %task_ref,
                attempt,
                interval_ms = interval.as_millis() as u64,
                "Job not completed yet"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(JobError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
