//! Reqwest-backed [`Transport`] for the first-party backend.
//!
//! This adapter owns transport details only: URL assembly, the bearer
//! header, the request timeout, and JSON framing. Status codes are passed
//! through untouched for the resource client to interpret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::ports::{Method, RemoteRequest, RemoteResponse, Transport, TransportError};

const USER_AGENT: &str = concat!("scholarship-portal-client/", env!("CARGO_PKG_VERSION"));

/// HTTP transport rooted at the API base URL.
pub struct ReqwestTransport {
    client: Client,
    base: String,
}

impl ReqwestTransport {
    /// Build a transport with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base: base.as_str().trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = self.url(&request.path);
        debug!(%method, %url, "sending backend request");

        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = request.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        let body = decode_body(status, &bytes)?;
        Ok(RemoteResponse::new(status, body))
    }
}

fn map_transport_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::timeout(error.to_string())
    } else if error.is_decode() {
        TransportError::decode(error.to_string())
    } else {
        TransportError::connection(error.to_string())
    }
}

/// Empty bodies become `Null`. Non-JSON error bodies are wrapped as
/// `{"message": ...}` so the backend's text still reaches the caller.
fn decode_body(status: u16, bytes: &[u8]) -> Result<Value, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(error) if (200..300).contains(&status) => Err(TransportError::decode(format!(
            "status {status}: {error}"
        ))),
        Err(_) => Ok(json!({ "message": body_preview(bytes) })),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
