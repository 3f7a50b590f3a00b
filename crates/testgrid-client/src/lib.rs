//! Client library for the remote test execution service.
//!
//! The runner only depends on the [`ExecutionService`] trait; the
//! [`HttpExecutionService`] implementation talks to the real REST API.

pub mod error;
pub mod http;
pub mod service;

pub use error::ClientError;
pub use http::{HttpExecutionService, ServiceConfig};
pub use service::{
    ExecutionService, StatusResponse, SubmitRequest, SubmitResponse, TaskStatus,
    REMOTE_ERROR_STATUS,
};
