//! Runner configuration.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use testgrid_core::BrowserSpec;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("framework must be set")]
    MissingFramework,

    #[error("throttle must be at least 1 (omit it for no limit)")]
    ZeroThrottle,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What happens to progress events from jobs that finish after the run
/// already settled (only possible after an early abort).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LateEvents {
    /// Forward them to the sink like any other event.
    #[default]
    Deliver,
    /// Drop them.
    Suppress,
}

/// What happens to in-flight jobs when one job fails fatally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortPolicy {
    /// Leave them running in the background, unobserved.
    #[default]
    Detach,
    /// Signal every job's poll loop to stop.
    Cancel,
}

/// Test run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    /// Test framework identifier (e.g., "qunit", "mocha").
    pub framework: String,

    /// Wait between status polls, in milliseconds.
    #[serde(rename = "pollInterval")]
    pub poll_interval_ms: u64,

    /// Maximum concurrently running jobs. `None` means no limit.
    pub throttle: Option<usize>,

    /// Build identifier jobs are grouped under.
    pub build: Option<String>,

    /// Display name for jobs.
    pub name: Option<String>,

    /// Provider-specific options merged into every submission.
    pub extra_options: Map<String, Value>,

    /// Whether browsers reach the test pages through a tunnel.
    pub tunneled: bool,

    /// Tunnel identifier, sent when `tunneled` is set.
    pub tunnel_identifier: Option<String>,

    /// Browsers to run on.
    pub browsers: Vec<BrowserSpec>,

    /// Test page URLs.
    pub urls: Vec<String>,

    /// Handling of progress events that arrive after an early abort.
    pub late_events: LateEvents,

    /// Handling of in-flight jobs after an early abort.
    pub on_abort: AbortPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            framework: String::new(),
            poll_interval_ms: 2000,
            throttle: None,
            build: None,
            name: None,
            extra_options: Map::new(),
            tunneled: false,
            tunnel_identifier: None,
            browsers: Vec::new(),
            urls: Vec::new(),
            late_events: LateEvents::default(),
            on_abort: AbortPolicy::default(),
        }
    }
}

impl RunnerConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the settings the runner cannot work without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.framework.is_empty() {
            return Err(ConfigError::MissingFramework);
        }
        if self.throttle == Some(0) {
            return Err(ConfigError::ZeroThrottle);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Tunnel identifier to attach to submissions, if tunneling is on.
    pub fn active_tunnel(&self) -> Option<&str> {
        if self.tunneled {
            self.tunnel_identifier.as_deref()
        } else {
            None
        }
    }
}
