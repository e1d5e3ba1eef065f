//! Reqwest-backed [`IdentityProvider`] speaking the Identity Toolkit REST
//! API (`accounts:signUp`, `accounts:signInWithPassword`, `accounts:delete`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ports::{IdentityProvider, IdentityProviderError};
use crate::domain::{Credentials, Email, ExternalIdentity};

/// Identity Toolkit adapter authenticated by a project API key.
pub struct IdentityToolkitProvider {
    client: Client,
    base: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: String,
    id_token: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl IdentityToolkitProvider {
    /// Build an adapter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base: &Url,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base.as_str().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        action: &str,
        body: &B,
        email: &str,
    ) -> Result<Vec<u8>, IdentityProviderError> {
        debug!(action, "calling identity provider");
        let response = self
            .client
            .post(format!("{}/accounts:{action}", self.base))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if status.is_success() {
            return Ok(bytes.to_vec());
        }
        Err(map_status_error(status, &bytes, email))
    }

    async fn password_flow(
        &self,
        action: &str,
        credentials: &Credentials,
    ) -> Result<ExternalIdentity, IdentityProviderError> {
        let email = credentials.email().as_ref();
        let request = PasswordRequest {
            email,
            password: credentials.password(),
            return_secure_token: true,
        };
        let bytes = self.post(action, &request, email).await?;
        parse_account(&bytes)
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitProvider {
    async fn sign_up(
        &self,
        credentials: &Credentials,
    ) -> Result<ExternalIdentity, IdentityProviderError> {
        self.password_flow("signUp", credentials).await
    }

    async fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> Result<ExternalIdentity, IdentityProviderError> {
        self.password_flow("signInWithPassword", credentials).await
    }

    async fn delete(&self, identity: &ExternalIdentity) -> Result<(), IdentityProviderError> {
        let request = DeleteRequest {
            id_token: identity.credential(),
        };
        self.post("delete", &request, identity.email().as_ref())
            .await
            .map(drop)
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        // Password sessions are stateless on the provider side.
        Ok(())
    }
}

fn parse_account(bytes: &[u8]) -> Result<ExternalIdentity, IdentityProviderError> {
    let account: AccountResponse = serde_json::from_slice(bytes).map_err(|error| {
        IdentityProviderError::rejected(format!("unexpected provider payload: {error}"))
    })?;
    let email = Email::new(&account.email).map_err(|error| {
        IdentityProviderError::rejected(format!("provider returned {}: {error}", account.email))
    })?;
    Ok(ExternalIdentity::new(account.local_id, email, account.id_token))
}

fn map_transport_error(error: reqwest::Error) -> IdentityProviderError {
    IdentityProviderError::unavailable(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8], email: &str) -> IdentityProviderError {
    if status.is_server_error() {
        return IdentityProviderError::unavailable(format!("status {}", status.as_u16()));
    }
    let message = serde_json::from_slice::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| format!("status {}", status.as_u16()));
    // Codes may carry detail after a colon, e.g. `WEAK_PASSWORD : ...`.
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_EXISTS" => IdentityProviderError::already_exists(email),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            IdentityProviderError::invalid_credential(message)
        }
        "TOO_MANY_ATTEMPTS_TRY_LATER" => IdentityProviderError::unavailable(message),
        _ => IdentityProviderError::rejected(message),
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network mapping helpers.

    use super::*;
    use rstest::rstest;

    fn envelope(message: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "error": { "code": 400, "message": message }
        }))
        .expect("encode")
    }

    #[rstest]
    #[case::exists("EMAIL_EXISTS", "AlreadyExists")]
    #[case::bad_password("INVALID_PASSWORD", "InvalidCredential")]
    #[case::unified_login("INVALID_LOGIN_CREDENTIALS", "InvalidCredential")]
    #[case::weak("WEAK_PASSWORD : Password should be at least 6 characters", "Rejected")]
    #[case::throttled("TOO_MANY_ATTEMPTS_TRY_LATER : Try again later.", "Unavailable")]
    fn maps_provider_codes(#[case] message: &str, #[case] expected: &str) {
        let error = map_status_error(StatusCode::BAD_REQUEST, &envelope(message), "a@x.com");
        let variant = match error {
            IdentityProviderError::AlreadyExists { .. } => "AlreadyExists",
            IdentityProviderError::InvalidCredential { .. } => "InvalidCredential",
            IdentityProviderError::Unavailable { .. } => "Unavailable",
            IdentityProviderError::Rejected { .. } => "Rejected",
        };
        assert_eq!(variant, expected);
    }

    #[test]
    fn server_errors_are_unavailable() {
        let error = map_status_error(StatusCode::SERVICE_UNAVAILABLE, b"", "a@x.com");
        assert!(matches!(error, IdentityProviderError::Unavailable { .. }));
    }

    #[test]
    fn parses_account_payload() {
        let body = br#"{"localId":"uid-1","email":"A@x.com","idToken":"id-tok","refreshToken":"r"}"#;

        let identity = parse_account(body).expect("payload decodes");

        assert_eq!(identity.id(), "uid-1");
        assert_eq!(identity.email().as_ref(), "a@x.com");
        assert_eq!(identity.credential(), "id-tok");
    }
}
