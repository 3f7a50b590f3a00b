//! HTTP implementation of the execution service.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use testgrid_core::TaskRef;

use crate::error::ClientError;
use crate::service::{status_body, ExecutionService, StatusResponse, SubmitRequest, SubmitResponse};

/// Connection settings for the execution service.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// REST API root (e.g., "https://saucelabs.com/rest").
    pub base_url: String,

    /// Account name, used in request paths and for basic auth.
    pub username: String,

    /// Account access key.
    pub access_key: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://saucelabs.com/rest".to_string(),
            username: String::new(),
            access_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("access_key", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Execution service client speaking JSON over HTTP with basic auth.
pub struct HttpExecutionService {
    inner: reqwest::Client,
    config: ServiceConfig,
}

impl HttpExecutionService {
    /// Create a new HTTP client.
    pub fn new(config: ServiceConfig) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            inner,
            config: ServiceConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    /// Endpoint that accepts submissions.
    pub fn submit_url(&self) -> String {
        format!("{}/v1/{}/js-tests", self.config.base_url, self.config.username)
    }

    /// Endpoint that reports task status.
    pub fn status_url(&self) -> String {
        format!("{}/status", self.submit_url())
    }

    /// POST a JSON body and return the response text of a 2xx answer.
    async fn post_json(&self, url: &str, body: &Value) -> Result<String, ClientError> {
        debug!(url = %url, "POST request");

        let response = self
            .inner
            .post(url)
            .basic_auth(&self.config.username, Some(&self.config.access_key))
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                method: "POST".to_string(),
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ClientError::Transport {
            method: "POST".to_string(),
            url: url.to_string(),
            source,
        })?;

        debug!(url = %url, status = status.as_u16(), bytes = text.len(), "POST response");

        if !status.is_success() {
            return Err(ClientError::Status {
                method: "POST".to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    fn decode_error(url: &str, body: String, source: serde_json::Error) -> ClientError {
        ClientError::Decode {
            method: "POST".to_string(),
            url: url.to_string(),
            body,
            source,
        }
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ClientError> {
        let url = self.submit_url();
        let text = self.post_json(&url, &request.to_body()).await?;
        SubmitResponse::from_body(text.clone()).map_err(|e| Self::decode_error(&url, text, e))
    }

    async fn status(&self, task_refs: &[TaskRef]) -> Result<StatusResponse, ClientError> {
        let url = self.status_url();
        let text = self.post_json(&url, &status_body(task_refs)).await?;
        serde_json::from_str(&text).map_err(|e| Self::decode_error(&url, text, e))
    }
}
