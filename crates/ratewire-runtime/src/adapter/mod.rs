//! External system adapters
//!
//! `call_system` steps are the only place the runtime leaves the process.
//! The orchestrator talks to a `SystemAdapter`; `HttpSystemAdapter` is the
//! production implementation, tests substitute their own.

pub mod http;
pub mod retry;

pub use http::{HttpSystemAdapter, SystemEndpoint};
pub use retry::{call_with_retry, RetryOutcome};

use async_trait::async_trait;
use ratewire_core::ast::HttpMethod;
use ratewire_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Request to a named external system
#[derive(Debug, Clone, PartialEq)]
pub struct SystemRequest {
    pub system: String,
    pub method: HttpMethod,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    /// Per-attempt timeout
    pub timeout: Duration,
}

/// Successful response of an external system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemResponse {
    pub status: u16,
    pub body: Value,
}

/// External call failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("Unknown system: {0}")]
    UnknownSystem(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connection(String),

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Cancelled")]
    Cancelled,
}

impl AdapterError {
    /// Timeouts, connection errors, 5xx and 429 are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Timeout(_) | AdapterError::Connection(_) => true,
            AdapterError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Transport to external systems
#[async_trait]
pub trait SystemAdapter: Send + Sync {
    /// Perform one attempt of the request
    async fn call(&self, request: &SystemRequest) -> Result<SystemResponse, AdapterError>;
}
