//! Scripted in-memory execution service for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use testgrid_client::{
    ClientError, ExecutionService, StatusResponse, SubmitRequest, SubmitResponse, TaskStatus,
    REMOTE_ERROR_STATUS,
};
use testgrid_core::{JobRef, TaskRef};

type SubmitFn = dyn Fn(&SubmitRequest) -> Result<SubmitResponse, ClientError> + Send + Sync;
type StatusFn =
    dyn Fn(&SubmitRequest, &TaskRef, u32) -> Result<StatusResponse, ClientError> + Send + Sync;

/// Execution service whose answers come from closures.
///
/// A submission answered with an empty default response gets a fresh
/// `task-N` reference. By default every status query answers "completed"
/// with a passing mocha result.
pub(crate) struct FakeService {
    submit: Box<SubmitFn>,
    status: Box<StatusFn>,
    latency: Duration,
    next_id: AtomicUsize,
    requests: Mutex<Vec<SubmitRequest>>,
    by_ref: Mutex<HashMap<TaskRef, SubmitRequest>>,
    polls: Mutex<HashMap<TaskRef, u32>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            submit: Box::new(|_| Ok(SubmitResponse::default())),
            status: Box::new(|_, task_ref, _| Ok(completed(task_ref, json!({"failures": 0})))),
            latency: Duration::ZERO,
            next_id: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            by_ref: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_submit<F>(mut self, submit: F) -> Self
    where
        F: Fn(&SubmitRequest) -> Result<SubmitResponse, ClientError> + Send + Sync + 'static,
    {
        self.submit = Box::new(submit);
        self
    }

    pub fn with_status<F>(mut self, status: F) -> Self
    where
        F: Fn(&SubmitRequest, &TaskRef, u32) -> Result<StatusResponse, ClientError>
            + Send
            + Sync
            + 'static,
    {
        self.status = Box::new(status);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn polls(&self, task_ref: &TaskRef) -> u32 {
        self.polls.lock().unwrap().get(task_ref).copied().unwrap_or(0)
    }

    pub fn total_polls(&self) -> u32 {
        self.polls.lock().unwrap().values().sum()
    }

    /// Most jobs that were submitted but not yet finished at any one time.
    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ExecutionService for FakeService {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ClientError> {
        self.delay().await;
        self.requests.lock().unwrap().push(request.clone());

        let mut response = (self.submit)(request)?;
        if response.task_refs.is_empty() && response.body.is_empty() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            response = SubmitResponse {
                task_refs: vec![TaskRef::new(format!("task-{}", id))],
                body: String::new(),
            };
        }

        if !response.task_refs.is_empty() {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }
        let mut by_ref = self.by_ref.lock().unwrap();
        for task_ref in &response.task_refs {
            by_ref.insert(task_ref.clone(), request.clone());
        }

        Ok(response)
    }

    async fn status(&self, task_refs: &[TaskRef]) -> Result<StatusResponse, ClientError> {
        self.delay().await;
        let task_ref = &task_refs[0];
        let attempt = {
            let mut polls = self.polls.lock().unwrap();
            let count = polls.entry(task_ref.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let request = self
            .by_ref
            .lock()
            .unwrap()
            .get(task_ref)
            .cloned()
            .unwrap_or_default();

        let response = (self.status)(&request, task_ref, attempt);
        if !matches!(response, Ok(ref r) if !r.completed) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        response
    }
}

pub(crate) fn pending() -> StatusResponse {
    StatusResponse {
        completed: false,
        tasks: Vec::new(),
    }
}

pub(crate) fn completed(task_ref: &TaskRef, result: Value) -> StatusResponse {
    StatusResponse {
        completed: true,
        tasks: vec![TaskStatus {
            id: task_ref.clone(),
            job_id: Some(JobRef::new(format!("job-{}", task_ref))),
            status: Some("test session finished".to_string()),
            platform: None,
            url: None,
            result: Some(result),
        }],
    }
}

/// Completed in the execution-error state, with a payload that would pass.
pub(crate) fn remote_error(task_ref: &TaskRef) -> StatusResponse {
    let mut response = completed(task_ref, json!({"passed": 10, "total": 10}));
    response.tasks[0].status = Some(REMOTE_ERROR_STATUS.to_string());
    response
}

/// The service answering 503, as it does during maintenance windows.
pub(crate) fn unavailable() -> ClientError {
    ClientError::Status {
        method: "POST".to_string(),
        url: "http://fake.test/rest".to_string(),
        status: 503,
        body: "Service Unavailable".to_string(),
    }
}
