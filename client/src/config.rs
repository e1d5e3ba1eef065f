//! Client configuration loaded via OrthoConfig.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use url::Url;
use serde::Deserialize;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_SESSION_DIR: &str = ".portal-session";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings for the portal client and its adapters.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PORTAL")]
pub struct ClientSettings {
    /// Base URL of the first-party backend API.
    pub api_base_url: Option<String>,
    /// Base URL of the identity provider REST API.
    pub identity_base_url: Option<String>,
    /// API key sent to the identity provider.
    pub identity_api_key: Option<String>,
    /// Directory holding the durable session slots.
    pub session_dir: Option<Utf8PathBuf>,
    /// Per-request timeout in seconds for both remote services.
    pub request_timeout_secs: Option<u64>,
}

/// A configured URL that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{setting} is not a valid URL ({value}): {message}")]
pub struct InvalidUrl {
    setting: &'static str,
    value: String,
    message: String,
}

impl ClientSettings {
    /// Backend base URL, falling back to the local development server.
    pub fn api_base_url(&self) -> Result<Url, InvalidUrl> {
        parse_url(
            "api_base_url",
            self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL),
        )
    }

    /// Identity provider base URL, falling back to Identity Toolkit v1.
    pub fn identity_base_url(&self) -> Result<Url, InvalidUrl> {
        parse_url(
            "identity_base_url",
            self.identity_base_url
                .as_deref()
                .unwrap_or(DEFAULT_IDENTITY_BASE_URL),
        )
    }

    /// Identity provider API key; empty when unset.
    pub fn identity_api_key(&self) -> &str {
        self.identity_api_key.as_deref().unwrap_or_default()
    }

    /// Session directory, falling back to `.portal-session`.
    pub fn session_dir(&self) -> Utf8PathBuf {
        self.session_dir
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_SESSION_DIR))
    }

    /// Request timeout, falling back to 30 seconds. Zero is raised to one.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .max(1),
        )
    }
}

fn parse_url(setting: &'static str, value: &str) -> Result<Url, InvalidUrl> {
    Url::parse(value).map_err(|error| InvalidUrl {
        setting,
        value: value.to_owned(),
        message: error.to_string(),
    })
}
