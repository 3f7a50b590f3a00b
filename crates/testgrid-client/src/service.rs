//! The execution service contract and its wire types.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use testgrid_core::{JobRef, TaskRef};

use crate::error::ClientError;

/// Terminal status the service reports when the execution itself broke.
///
/// A task in this state is marked completed but has no evaluable result.
pub const REMOTE_ERROR_STATUS: &str = "test error";

/// Remote service that executes test pages in real browsers.
///
/// Implement this trait to plug in a different transport; the runner
/// only ever talks to the service through it.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Submit a test page for execution on one or more platforms.
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ClientError>;

    /// Query the status of previously submitted tasks.
    async fn status(&self, task_refs: &[TaskRef]) -> Result<StatusResponse, ClientError>;
}

/// Body of a submission request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitRequest {
    /// `[platform, browserName, version]` triples.
    pub platforms: Vec<[String; 3]>,
    /// Test page URL.
    pub url: String,
    /// Framework identifier (e.g., "qunit").
    pub framework: String,
    /// Build identifier the job is grouped under.
    pub build: Option<String>,
    /// Display name for the job.
    pub name: Option<String>,
    /// Tunnel to route the browser's traffic through.
    pub tunnel_identifier: Option<String>,
    /// Provider-specific options merged into the body.
    pub extra: Map<String, Value>,
}

impl SubmitRequest {
    /// Render the JSON body.
    ///
    /// Extra options are deep-merged underneath the fields above: they add
    /// keys and fill nested objects but never replace a value already set.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("platforms".to_string(), json!(self.platforms));
        body.insert("url".to_string(), json!(self.url));
        body.insert("framework".to_string(), json!(self.framework));
        if let Some(build) = &self.build {
            body.insert("build".to_string(), json!(build));
        }
        if let Some(name) = &self.name {
            body.insert("name".to_string(), json!(name));
        }
        if let Some(tunnel) = &self.tunnel_identifier {
            body.insert("tunnel-identifier".to_string(), json!(tunnel));
        }
        merge_missing(&mut body, &self.extra);
        Value::Object(body)
    }
}

fn merge_missing(target: &mut Map<String, Value>, extra: &Map<String, Value>) {
    for (key, value) in extra {
        match (target.get_mut(key), value) {
            (None, _) => {
                target.insert(key.clone(), value.clone());
            }
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_missing(existing, nested);
            }
            (Some(_), _) => {}
        }
    }
}

/// Response to a submission request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitResponse {
    /// Task references assigned by the service, one per platform.
    pub task_refs: Vec<TaskRef>,
    /// The raw response body, kept for diagnostics.
    pub body: String,
}

#[derive(Deserialize)]
struct SubmitWire {
    #[serde(rename = "js tests", default)]
    task_refs: Vec<TaskRef>,
}

impl SubmitResponse {
    /// Parse a response body.
    pub fn from_body(body: impl Into<String>) -> Result<Self, serde_json::Error> {
        let body = body.into();
        let wire: SubmitWire = serde_json::from_str(&body)?;
        Ok(Self {
            task_refs: wire.task_refs,
            body,
        })
    }
}

/// Build the body of a status request.
pub fn status_body(task_refs: &[TaskRef]) -> Value {
    json!({ "js tests": task_refs })
}

/// Response to a status request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusResponse {
    /// True once every queried task has finished.
    #[serde(default)]
    pub completed: bool,

    /// Per-task status entries.
    #[serde(rename = "js tests", default)]
    pub tasks: Vec<TaskStatus>,
}

impl StatusResponse {
    /// Find the entry for a task reference.
    pub fn task(&self, task_ref: &TaskRef) -> Option<&TaskStatus> {
        self.tasks.iter().find(|t| &t.id == task_ref)
    }
}

/// Status of one submitted task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatus {
    /// The task reference this entry describes.
    pub id: TaskRef,

    /// Finished execution record, once assigned.
    #[serde(default)]
    pub job_id: Option<JobRef>,

    /// Terminal status string.
    #[serde(default)]
    pub status: Option<String>,

    /// Platform the task ran on, as reported by the service.
    #[serde(default)]
    pub platform: Option<Value>,

    /// Test page URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Framework-specific result payload, present once completed.
    #[serde(default)]
    pub result: Option<Value>,
}

impl TaskStatus {
    /// Returns true if the service reports the execution itself failed.
    pub fn is_remote_error(&self) -> bool {
        self.status.as_deref() == Some(REMOTE_ERROR_STATUS)
    }
}
