//! Authenticated remote calls against the first-party backend.
//!
//! [`RemoteResourceClient`] is the single point where session expiry is
//! detected and enforced. It reads the bearer token from the session store
//! immediately before every call, fails locally when a required token is
//! missing, and clears the offending session when the backend answers 401 or
//! 403. It never retries.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::ports::{RemoteRequest, RemoteResponse, SessionStore, Transport, TransportError};
use super::{CallScope, Endpoint, ErrorKind, Role, SliceError};

/// Failures surfaced by [`RemoteResourceClient::call`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The call needs a session that is not held locally. No request was sent.
    #[error("no {role} session is held locally")]
    Unauthenticated {
        /// Role whose session was required.
        role: Role,
    },
    /// The backend rejected the token; the matching session has been cleared.
    #[error("session rejected by the backend: {message}")]
    Unauthorized {
        /// Role whose token was sent, if any.
        role: Option<Role>,
        /// Backend message.
        message: String,
    },
    /// The resource already exists.
    #[error("conflict: {message}")]
    Conflict {
        /// Backend message.
        message: String,
    },
    /// The backend refused the payload as malformed.
    #[error("invalid request: {message}")]
    Validation {
        /// Backend message.
        message: String,
    },
    /// Network failure, timeout, or gateway error.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Transport or gateway detail.
        message: String,
    },
    /// Any other non-success status.
    #[error("backend rejected the request with status {status}: {message}")]
    BackendRejected {
        /// HTTP status.
        status: u16,
        /// Backend message.
        message: String,
    },
    /// A success response did not match the expected shape.
    #[error("unexpected response payload: {message}")]
    Decode {
        /// Decoder detail.
        message: String,
    },
    /// The session store could not be read.
    #[error("session storage failed: {message}")]
    Storage {
        /// Store detail.
        message: String,
    },
}

impl HttpError {
    /// Taxonomy bucket for this failure.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Unavailable { .. } | Self::Storage { .. } => ErrorKind::Unavailable,
            Self::BackendRejected { .. } | Self::Decode { .. } => ErrorKind::BackendRejected,
        }
    }

    /// Message suitable for the UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { message, .. }
            | Self::Conflict { message }
            | Self::Validation { message }
            | Self::BackendRejected { message, .. } => message.clone(),
            Self::Unauthenticated { .. }
            | Self::Unavailable { .. }
            | Self::Decode { .. }
            | Self::Storage { .. } => String::new(),
        }
    }
}

impl From<HttpError> for SliceError {
    fn from(value: HttpError) -> Self {
        Self::new(value.kind(), value.user_message())
    }
}

/// Token attached to one outgoing call.
struct Bearer {
    role: Role,
    token: String,
}

/// Authenticated HTTP call wrapper.
#[derive(Clone)]
pub struct RemoteResourceClient {
    transport: Arc<dyn Transport>,
    sessions: Arc<dyn SessionStore>,
}

impl RemoteResourceClient {
    /// Build a client over a transport and the shared session store.
    pub fn new(transport: Arc<dyn Transport>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            transport,
            sessions,
        }
    }

    /// Session store this client reads tokens from.
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Call `endpoint` without a body and decode the JSON response as `T`.
    ///
    /// Use [`serde::de::IgnoredAny`] for responses whose body is irrelevant.
    pub async fn call<T>(&self, endpoint: &Endpoint, scope: CallScope) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.dispatch(endpoint, scope, None).await
    }

    /// Call `endpoint` with a JSON body.
    pub async fn call_json<B, T>(
        &self,
        endpoint: &Endpoint,
        scope: CallScope,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let value = serde_json::to_value(body).map_err(|error| HttpError::Validation {
            message: format!("request body could not be encoded: {error}"),
        })?;
        self.dispatch(endpoint, scope, Some(value)).await
    }

    async fn dispatch<T>(
        &self,
        endpoint: &Endpoint,
        scope: CallScope,
        body: Option<Value>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let bearer = self.resolve_bearer(scope)?;
        debug!(
            method = %endpoint.method(),
            path = endpoint.path(),
            role = ?bearer.as_ref().map(|bearer| bearer.role),
            "dispatching remote call"
        );
        let request = RemoteRequest {
            method: endpoint.method(),
            path: endpoint.path().to_owned(),
            query: endpoint.query().to_vec(),
            bearer: bearer.as_ref().map(|bearer| bearer.token.clone()),
            body,
        };
        let response = self
            .transport
            .send(request)
            .await
            .map_err(map_transport_error)?;

        if response.is_success() {
            return serde_json::from_value(response.body).map_err(|error| HttpError::Decode {
                message: error.to_string(),
            });
        }
        Err(self.map_failure(&response, bearer))
    }

    fn resolve_bearer(&self, scope: CallScope) -> Result<Option<Bearer>, HttpError> {
        match scope {
            CallScope::None => Ok(None),
            CallScope::User => self.require(Role::User).map(Some),
            CallScope::Admin => self.require(Role::Admin).map(Some),
            CallScope::Optional => {
                for role in [Role::Admin, Role::User] {
                    if let Some(bearer) = self.read(role)? {
                        return Ok(Some(bearer));
                    }
                }
                Ok(None)
            }
        }
    }

    fn require(&self, role: Role) -> Result<Bearer, HttpError> {
        self.read(role)?
            .ok_or(HttpError::Unauthenticated { role })
    }

    fn read(&self, role: Role) -> Result<Option<Bearer>, HttpError> {
        let session = self.sessions.get(role).map_err(|error| HttpError::Storage {
            message: error.to_string(),
        })?;
        Ok(session.map(|session| Bearer {
            role,
            token: session.token().expose().to_owned(),
        }))
    }

    fn map_failure(&self, response: &RemoteResponse, bearer: Option<Bearer>) -> HttpError {
        let status = response.status;
        let message = response
            .message()
            .map_or_else(|| format!("status {status}"), str::to_owned);
        match status {
            401 | 403 => {
                let role = bearer.map(|bearer| {
                    self.expire(&bearer);
                    bearer.role
                });
                HttpError::Unauthorized { role, message }
            }
            409 => HttpError::Conflict { message },
            400 | 422 => HttpError::Validation { message },
            408 | 502 | 503 | 504 => HttpError::Unavailable { message },
            _ => HttpError::BackendRejected { status, message },
        }
    }

    /// Clear the session that carried `bearer`, unless it was replaced while
    /// the call was in flight.
    fn expire(&self, bearer: &Bearer) {
        let current = match self.sessions.get(bearer.role) {
            Ok(current) => current,
            Err(error) => {
                warn!(role = %bearer.role, %error, "could not read session before clearing it");
                None
            }
        };
        let replaced = current
            .as_ref()
            .is_some_and(|session| session.token().expose() != bearer.token);
        if replaced {
            debug!(role = %bearer.role, "session replaced during call; keeping the new one");
            return;
        }
        warn!(role = %bearer.role, "backend rejected session token; clearing session");
        if let Err(error) = self.sessions.clear(bearer.role) {
            warn!(role = %bearer.role, %error, "failed to clear rejected session");
        }
    }
}

fn map_transport_error(error: TransportError) -> HttpError {
    match error {
        TransportError::Timeout { message } | TransportError::Connection { message } => {
            HttpError::Unavailable { message }
        }
        TransportError::Decode { message } => HttpError::Decode { message },
    }
}
