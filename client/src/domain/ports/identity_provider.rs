//! Port for the external (federated) identity provider.
//!
//! The provider is opaque: it establishes or verifies an
//! [`ExternalIdentity`] and can delete one it created. Reconciliation binds
//! that identity to a first-party session.

use async_trait::async_trait;

use crate::domain::{Credentials, Email, ExternalIdentity};

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity provider adapters.
    pub enum IdentityProviderError {
        /// Sign-up found an identity already registered for the e-mail.
        AlreadyExists { email: String } => "an identity already exists for {email}",
        /// The provider rejected the credential.
        InvalidCredential { message: String } => "credential rejected: {message}",
        /// The provider could not be reached or timed out.
        Unavailable { message: String } => "identity provider unavailable: {message}",
        /// Any other provider-side refusal.
        Rejected { message: String } => "identity provider refused the request: {message}",
    }
}

impl IdentityProviderError {
    /// Convenience for [`Self::AlreadyExists`] from a validated e-mail.
    pub fn exists_for(email: &Email) -> Self {
        Self::already_exists(email.as_ref())
    }
}

/// External identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a new identity.
    ///
    /// Returns [`IdentityProviderError::AlreadyExists`] when the e-mail is
    /// already registered with the provider.
    async fn sign_up(
        &self,
        credentials: &Credentials,
    ) -> Result<ExternalIdentity, IdentityProviderError>;

    /// Verify an existing identity.
    async fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> Result<ExternalIdentity, IdentityProviderError>;

    /// Delete an identity previously returned by [`Self::sign_up`].
    async fn delete(&self, identity: &ExternalIdentity) -> Result<(), IdentityProviderError>;

    /// End the provider-side session, if the provider keeps one.
    async fn sign_out(&self) -> Result<(), IdentityProviderError>;
}
