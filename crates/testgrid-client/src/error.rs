//! Error types for the execution service client.

use thiserror::Error;

/// Errors that can occur when talking to the execution service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached (connect failure, timeout, ...).
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success HTTP status.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The service answered with a success status but an unreadable body.
    #[error("{method} {url} returned an unexpected body ({source}): {body}")]
    Decode {
        method: String,
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// The client could not be constructed.
    #[error("invalid client configuration: {0}")]
    Config(String),
}
