//! Port for the generic "remote call" capability.
//!
//! Transport adapters own HTTP mechanics only: URL assembly, headers,
//! timeouts, and JSON framing. Status interpretation and session handling
//! live in [`RemoteResourceClient`](crate::domain::RemoteResourceClient).

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use super::define_port_error;

/// HTTP method subset used by the backend surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// Fully resolved request handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API base, starting with `/`.
    pub path: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
    /// Bearer token for the `Authorization` header.
    pub bearer: Option<String>,
    /// JSON body.
    pub body: Option<Value>,
}

/// Raw response: status plus decoded JSON (`Null` for empty bodies).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded body.
    pub body: Value,
}

impl RemoteResponse {
    /// Build a response.
    pub const fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Whether the status is 2xx.
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// The backend's `message` field, if it sent one.
    pub fn message(&self) -> Option<&str> {
        match &self.body {
            Value::String(text) => Some(text.as_str()),
            other => other.get("message").and_then(Value::as_str),
        }
    }
}

define_port_error! {
    /// Errors raised by transport adapters.
    pub enum TransportError {
        /// The request timed out.
        Timeout { message: String } => "request timed out: {message}",
        /// Connection could not be established or was dropped.
        Connection { message: String } => "connection failed: {message}",
        /// A success response carried a body that was not JSON.
        Decode { message: String } => "response body was not valid JSON: {message}",
    }
}

/// Generic remote call capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Never retries.
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError>;
}
