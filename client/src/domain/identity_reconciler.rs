//! Binds an external identity to a first-party, role-scoped session.
//!
//! Each flow is two-phase: establish the identity with the external
//! provider, then exchange it with the backend for a session token. A
//! sign-up whose backend registration is refused deletes the identity it
//! just created before reporting the failure, so the two systems never
//! disagree about whether an account exists. A session is written exactly
//! once, and only after both phases succeed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::ports::{IdentityProvider, IdentityProviderError, SessionStore};
use super::{
    AuthValidationError, CallScope, Credentials, Email, Endpoint, ErrorKind, ExternalIdentity,
    HttpError, RemoteResourceClient, Role, Session, SessionToken, SignUpProfile, SliceError,
};

/// Failures surfaced by reconciliation flows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Input failed validation; nothing was sent.
    #[error("{0}")]
    Validation(AuthValidationError),
    /// The identity provider rejected the credential.
    #[error("credential rejected: {message}")]
    InvalidCredential {
        /// Provider detail.
        message: String,
    },
    /// The backend refused to issue a session.
    #[error("backend refused the session: {message}")]
    BackendRejected {
        /// Backend message.
        message: String,
    },
    /// The backend refused a sign-up and the compensating deletion of the
    /// freshly created provider identity also failed.
    #[error("backend refused the sign-up ({message}) and the provider identity could not be removed: {rollback}")]
    RollbackFailed {
        /// Backend message.
        message: String,
        /// Provider failure during deletion.
        rollback: String,
    },
    /// Provider or backend unreachable; state is left for the user to retry.
    #[error("authentication service unavailable: {message}")]
    Unavailable {
        /// Transport detail.
        message: String,
    },
    /// The session could not be written to durable storage.
    #[error("could not store the session: {message}")]
    Storage {
        /// Store detail.
        message: String,
    },
}

impl AuthError {
    /// Taxonomy bucket for this failure.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidCredential { .. } => ErrorKind::InvalidCredential,
            Self::BackendRejected { .. } | Self::RollbackFailed { .. } => {
                ErrorKind::BackendRejected
            }
            Self::Unavailable { .. } | Self::Storage { .. } => ErrorKind::Unavailable,
        }
    }

    fn from_provider(error: IdentityProviderError) -> Self {
        match error {
            IdentityProviderError::Unavailable { message } => Self::Unavailable { message },
            IdentityProviderError::InvalidCredential { message }
            | IdentityProviderError::Rejected { message } => Self::InvalidCredential { message },
            IdentityProviderError::AlreadyExists { email } => Self::InvalidCredential {
                message: format!("an account already exists for {email}"),
            },
        }
    }

    fn from_backend(error: HttpError) -> Self {
        match error {
            HttpError::Unavailable { message } | HttpError::Storage { message } => {
                Self::Unavailable { message }
            }
            other => Self::BackendRejected {
                message: other.to_string(),
            },
        }
    }
}

impl From<AuthValidationError> for AuthError {
    fn from(value: AuthValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AuthError> for SliceError {
    fn from(value: AuthError) -> Self {
        let message = match &value {
            AuthError::Validation(inner) => inner.to_string(),
            AuthError::BackendRejected { message } | AuthError::RollbackFailed { message, .. } => {
                message.clone()
            }
            AuthError::InvalidCredential { .. }
            | AuthError::Unavailable { .. }
            | AuthError::Storage { .. } => String::new(),
        };
        Self::new(value.kind(), message)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInBody<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_google_user: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpBody<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    full_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_code: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_google_user: bool,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// How the provider identity for a sign-up came to exist.
enum Established {
    /// Created by this call; deleted again if the backend refuses.
    Created(ExternalIdentity),
    /// Already registered with the provider; left alone on failure.
    Existing,
}

/// Orchestrates provider sign-in/sign-up and backend session exchange.
#[derive(Clone)]
pub struct IdentityReconciler {
    provider: Arc<dyn IdentityProvider>,
    client: RemoteResourceClient,
    sessions: Arc<dyn SessionStore>,
}

impl IdentityReconciler {
    /// Wire the reconciler to its collaborators.
    ///
    /// Sessions are written to the same store `client` reads tokens from.
    pub fn new(provider: Arc<dyn IdentityProvider>, client: RemoteResourceClient) -> Self {
        let sessions = Arc::clone(client.sessions());
        Self {
            provider,
            client,
            sessions,
        }
    }

    /// Verify `credentials` with the provider, then obtain a `role` session.
    pub async fn sign_in(&self, role: Role, credentials: &Credentials) -> Result<Session, AuthError> {
        self.provider
            .sign_in(credentials)
            .await
            .map_err(AuthError::from_provider)?;
        let body = SignInBody {
            email: credentials.email().as_ref(),
            password: Some(credentials.password()),
            is_google_user: false,
        };
        let token = self.exchange(&Endpoint::sign_in(role), &body).await?;
        self.persist(role, token, credentials.email().clone())
    }

    /// Obtain a user session for an identity established by a federated
    /// login elsewhere; the provider password step is skipped.
    pub async fn sign_in_federated(&self, identity: &ExternalIdentity) -> Result<Session, AuthError> {
        let body = SignInBody {
            email: identity.email().as_ref(),
            password: None,
            is_google_user: true,
        };
        let token = self.exchange(&Endpoint::sign_in(Role::User), &body).await?;
        self.persist(Role::User, token, identity.email().clone())
    }

    /// Register with the provider and the backend, then obtain a session.
    ///
    /// An e-mail already registered with the provider (but not yet with the
    /// backend) falls back to a provider sign-in with the same credential.
    /// If the backend then refuses, an identity created by this call is
    /// deleted before the error is returned. Network failures skip the
    /// rollback and leave state for the user to retry.
    pub async fn sign_up(
        &self,
        role: Role,
        credentials: &Credentials,
        profile: &SignUpProfile,
    ) -> Result<Session, AuthError> {
        credentials.ensure_sign_up_strength()?;
        profile.ensure_role(role)?;

        let established = self.establish(credentials).await?;
        let body = SignUpBody {
            email: credentials.email().as_ref(),
            password: Some(credentials.password()),
            full_name: profile.full_name(),
            admin_code: profile.admin_code(),
            is_google_user: false,
        };
        match self.exchange(&Endpoint::sign_up(role), &body).await {
            Ok(token) => self.persist(role, token, credentials.email().clone()),
            Err(error @ AuthError::Unavailable { .. }) => Err(error),
            Err(error) => match established {
                Established::Created(identity) => Err(self.roll_back(identity, error).await),
                Established::Existing => Err(error),
            },
        }
    }

    /// Register a user whose identity was established by a federated login
    /// elsewhere, then obtain a user session.
    ///
    /// No provider account is created, so a refused registration has nothing
    /// to roll back.
    pub async fn sign_up_federated(
        &self,
        identity: &ExternalIdentity,
        profile: &SignUpProfile,
    ) -> Result<Session, AuthError> {
        let body = SignUpBody {
            email: identity.email().as_ref(),
            password: None,
            full_name: profile.full_name(),
            admin_code: None,
            is_google_user: true,
        };
        let token = self.exchange(&Endpoint::sign_up(Role::User), &body).await?;
        self.persist(Role::User, token, identity.email().clone())
    }

    /// Sign out of the provider and drop every role's session.
    ///
    /// A provider failure is logged; local sessions are cleared regardless.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Err(error) = self.provider.sign_out().await {
            warn!(%error, "identity provider sign-out failed");
        }
        self.sessions.clear_all().map_err(|error| AuthError::Storage {
            message: error.to_string(),
        })
    }

    async fn establish(&self, credentials: &Credentials) -> Result<Established, AuthError> {
        match self.provider.sign_up(credentials).await {
            Ok(identity) => Ok(Established::Created(identity)),
            Err(IdentityProviderError::AlreadyExists { .. }) => {
                debug!(email = %credentials.email(), "identity exists with provider; signing in instead");
                self.provider
                    .sign_in(credentials)
                    .await
                    .map_err(AuthError::from_provider)?;
                Ok(Established::Existing)
            }
            Err(error) => Err(AuthError::from_provider(error)),
        }
    }

    async fn roll_back(&self, identity: ExternalIdentity, cause: AuthError) -> AuthError {
        let message = match &cause {
            AuthError::BackendRejected { message } => message.clone(),
            other => other.to_string(),
        };
        match self.provider.delete(&identity).await {
            Ok(()) => {
                info!(email = %identity.email(), "removed provider identity after refused sign-up");
                cause
            }
            Err(error) => {
                warn!(email = %identity.email(), %error, "provider identity orphaned after refused sign-up");
                AuthError::RollbackFailed {
                    message,
                    rollback: error.to_string(),
                }
            }
        }
    }

    async fn exchange<B>(&self, endpoint: &Endpoint, body: &B) -> Result<SessionToken, AuthError>
    where
        B: Serialize + Sync,
    {
        let response: TokenResponse = self
            .client
            .call_json(endpoint, CallScope::None, body)
            .await
            .map_err(AuthError::from_backend)?;
        SessionToken::new(response.token).ok_or_else(|| AuthError::BackendRejected {
            message: "backend issued an empty session token".to_owned(),
        })
    }

    fn persist(&self, role: Role, token: SessionToken, email: Email) -> Result<Session, AuthError> {
        let session = Session::new(role, token, email);
        self.sessions
            .set(role, &session)
            .map_err(|error| AuthError::Storage {
                message: error.to_string(),
            })?;
        info!(%role, email = %session.subject_email(), "session established");
        Ok(session)
    }
}

#[cfg(test)]
mod tests;
