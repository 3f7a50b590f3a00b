//! Config file loading and command-line overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use testgrid_client::ServiceConfig;
use testgrid_runner::{ConfigError, RunnerConfig};

use crate::Args;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),

    #[error("no credentials: pass --username/--access-key or set TESTGRID_USERNAME/TESTGRID_ACCESS_KEY")]
    MissingCredentials,
}

/// Contents of a config file: run settings at the top level, connection
/// settings under `service`.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(flatten)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub service: ServiceConfig,
}

impl FileConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply command-line overrides, then validate.
    pub fn apply(mut self, args: &Args) -> Result<Self, LoadError> {
        let runner = &mut self.runner;
        if let Some(framework) = &args.framework {
            runner.framework = framework.clone();
        }
        if let Some(throttle) = args.throttle {
            runner.throttle = Some(throttle);
        }
        if let Some(build) = &args.build {
            runner.build = Some(build.clone());
        }
        if let Some(name) = &args.name {
            runner.name = Some(name.clone());
        }
        if let Some(interval) = args.poll_interval_ms {
            runner.poll_interval_ms = interval;
        }
        if !args.urls.is_empty() {
            runner.urls = args.urls.clone();
        }
        if let Some(tunnel) = &args.tunnel_identifier {
            runner.tunneled = true;
            runner.tunnel_identifier = Some(tunnel.clone());
        }

        let service = &mut self.service;
        if let Some(base_url) = &args.base_url {
            service.base_url = base_url.clone();
        }
        if let Some(username) = &args.username {
            service.username = username.clone();
        }
        if let Some(access_key) = &args.access_key {
            service.access_key = access_key.clone();
        }

        self.runner.validate()?;
        if self.service.username.is_empty() || self.service.access_key.is_empty() {
            return Err(LoadError::MissingCredentials);
        }
        Ok(self)
    }
}
