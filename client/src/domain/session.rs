//! First-party sessions issued by the backend after reconciliation.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Email, Role};

/// Opaque bearer token issued by the first-party backend.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken(String);

/// A session token was blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session token must not be blank")]
pub struct BlankToken;

impl SessionToken {
    /// Wrap a token string, rejecting blank values.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_owned()))
    }

    /// Raw token for the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Decode the claims segment when the token is shaped like a JWT.
    ///
    /// The signature is not checked; the backend remains the authority. This
    /// only lets the client refuse obviously mis-scoped tokens early.
    ///
    /// # Examples
    /// ```
    /// use scholarship_portal::domain::SessionToken;
    ///
    /// let opaque = SessionToken::new("abc123").unwrap();
    /// assert!(opaque.peek_claims().is_none());
    /// ```
    pub fn peek_claims(&self) -> Option<TokenClaims> {
        let mut segments = self.0.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl TryFrom<String> for SessionToken {
    type Error = BlankToken;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(BlankToken)
    }
}

impl From<SessionToken> for String {
    fn from(value: SessionToken) -> Self {
        value.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Subset of JWT claims the client inspects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Subject identifier assigned by the backend.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Role claim, typically `USER` or `ADMIN`.
    #[serde(default)]
    pub role: Option<String>,
}

impl TokenClaims {
    /// Whether the claims are compatible with `role`.
    ///
    /// Claims without a `role` entry are treated as compatible.
    pub fn permits(&self, role: Role) -> bool {
        let Some(claimed) = self.role.as_deref() else {
            return true;
        };
        match role {
            Role::Admin => claimed.eq_ignore_ascii_case("ADMIN"),
            Role::User => !claimed.trim().is_empty(),
        }
    }
}

/// Role-scoped session held in durable storage.
///
/// Always written and read as a whole value so readers never observe a
/// half-updated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    role: Role,
    token: SessionToken,
    subject_email: Email,
}

impl Session {
    /// Assemble a session.
    pub const fn new(role: Role, token: SessionToken, subject_email: Email) -> Self {
        Self {
            role,
            token,
            subject_email,
        }
    }

    /// Role this session is scoped to.
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Bearer token.
    pub const fn token(&self) -> &SessionToken {
        &self.token
    }

    /// E-mail of the signed-in subject.
    pub const fn subject_email(&self) -> &Email {
        &self.subject_email
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn jwt_with_claims(claims: &str) -> SessionToken {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims);
        SessionToken::new(format!("{header}.{payload}.signature")).expect("token")
    }

    #[test]
    fn blank_tokens_are_rejected() {
        assert!(SessionToken::new("   ").is_none());
    }

    #[rstest]
    #[case::empty(r#""""#)]
    #[case::whitespace(r#""   ""#)]
    fn blank_tokens_are_rejected_when_deserialised(#[case] raw: &str) {
        let parsed: Result<SessionToken, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn deserialised_token_is_trimmed() {
        let parsed: SessionToken = serde_json::from_str(r#"" tok ""#).expect("token");
        assert_eq!(parsed.expose(), "tok");
    }

    #[test]
    fn debug_never_prints_token() {
        let token = SessionToken::new("secret-token").expect("token");
        assert!(!format!("{token:?}").contains("secret-token"));
    }

    #[rstest]
    #[case(r#"{"userId":"u1","role":"ADMIN"}"#, Role::Admin, true)]
    #[case(r#"{"userId":"u1","role":"USER"}"#, Role::Admin, false)]
    #[case(r#"{"userId":"u1","role":"USER"}"#, Role::User, true)]
    #[case(r#"{"userId":"u1"}"#, Role::Admin, true)]
    fn claims_gate_roles(#[case] claims: &str, #[case] role: Role, #[case] expected: bool) {
        let decoded = jwt_with_claims(claims).peek_claims().expect("decodable claims");
        assert_eq!(decoded.permits(role), expected);
    }

    #[test]
    fn session_round_trips_through_json() {
        let session = Session::new(
            Role::User,
            SessionToken::new("tok").expect("token"),
            Email::new("a@x.com").expect("email"),
        );
        let json = serde_json::to_value(&session).expect("serialise");
        assert_eq!(json["role"], "USER");
        assert_eq!(json["subjectEmail"], "a@x.com");
        let back: Session = serde_json::from_value(json).expect("deserialise");
        assert_eq!(back, session);
    }
}
