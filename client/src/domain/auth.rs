//! Authentication primitives: credentials, sign-up profiles, and the
//! transient external identity handed back by the identity provider.
//!
//! Constructors validate raw strings before any provider or backend call is
//! attempted, so malformed input surfaces as a validation failure and never
//! reaches the network.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::Role;

/// Minimum password length accepted at sign-up.
pub const PASSWORD_MIN: usize = 6;
/// Minimum full-name length accepted at sign-up.
pub const FULL_NAME_MIN: usize = 2;

/// Validation errors raised while building authentication inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthValidationError {
    /// E-mail was blank or not shaped like `local@domain.tld`.
    InvalidEmail,
    /// Password was empty.
    EmptyPassword,
    /// Password shorter than [`PASSWORD_MIN`] at sign-up.
    PasswordTooShort { min: usize },
    /// Full name shorter than [`FULL_NAME_MIN`] once trimmed.
    FullNameTooShort { min: usize },
    /// Admin sign-up without an admin code.
    MissingAdminCode,
}

impl fmt::Display for AuthValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "invalid email address"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
            Self::PasswordTooShort { min } => {
                write!(f, "password must be at least {min} characters")
            }
            Self::FullNameTooShort { min } => {
                write!(f, "name must be at least {min} characters")
            }
            Self::MissingAdminCode => write!(f, "admin code is required"),
        }
    }
}

impl std::error::Error for AuthValidationError {}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Normalised e-mail address (trimmed, lower-cased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validate and normalise an e-mail address.
    ///
    /// # Examples
    /// ```
    /// use scholarship_portal::domain::Email;
    ///
    /// let email = Email::new("  A@X.com ").unwrap();
    /// assert_eq!(email.as_ref(), "a@x.com");
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AuthValidationError> {
        let normalised = raw.as_ref().trim().to_lowercase();
        if !email_regex().is_match(&normalised) {
            return Err(AuthValidationError::InvalidEmail);
        }
        Ok(Self(normalised))
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl TryFrom<String> for Email {
    type Error = AuthValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// E-mail and password pair used against both the provider and the backend.
///
/// ## Invariants
/// - `password` is non-empty and keeps caller-provided whitespace.
/// - The password buffer is zeroised on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: Email,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Construct credentials from raw inputs.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, AuthValidationError> {
        let email = Email::new(email)?;
        if password.is_empty() {
            return Err(AuthValidationError::EmptyPassword);
        }
        Ok(Self {
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Validated e-mail.
    pub const fn email(&self) -> &Email {
        &self.email
    }

    /// Password as supplied by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }

    pub(crate) fn ensure_sign_up_strength(&self) -> Result<(), AuthValidationError> {
        if self.password.chars().count() < PASSWORD_MIN {
            return Err(AuthValidationError::PasswordTooShort { min: PASSWORD_MIN });
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Extra registration details sent to the backend at sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpProfile {
    full_name: String,
    admin_code: Option<String>,
}

impl SignUpProfile {
    /// Profile for a user sign-up.
    pub fn user(full_name: &str) -> Result<Self, AuthValidationError> {
        Ok(Self {
            full_name: validate_full_name(full_name)?,
            admin_code: None,
        })
    }

    /// Profile for an admin sign-up; the admin code is mandatory.
    pub fn admin(full_name: &str, admin_code: &str) -> Result<Self, AuthValidationError> {
        let code = admin_code.trim();
        if code.is_empty() {
            return Err(AuthValidationError::MissingAdminCode);
        }
        Ok(Self {
            full_name: validate_full_name(full_name)?,
            admin_code: Some(code.to_owned()),
        })
    }

    /// Trimmed full name.
    pub fn full_name(&self) -> &str {
        self.full_name.as_str()
    }

    /// Admin code, present only on admin profiles.
    pub fn admin_code(&self) -> Option<&str> {
        self.admin_code.as_deref()
    }

    pub(crate) fn ensure_role(&self, role: Role) -> Result<(), AuthValidationError> {
        match (role, &self.admin_code) {
            (Role::Admin, None) => Err(AuthValidationError::MissingAdminCode),
            _ => Ok(()),
        }
    }
}

fn validate_full_name(raw: &str) -> Result<String, AuthValidationError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < FULL_NAME_MIN {
        return Err(AuthValidationError::FullNameTooShort { min: FULL_NAME_MIN });
    }
    Ok(trimmed.to_owned())
}

/// Identity established with the external provider.
///
/// Held only for the duration of a reconciliation; never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    id: String,
    email: Email,
    credential: Zeroizing<String>,
}

impl ExternalIdentity {
    /// Wrap the provider's response.
    pub fn new(id: impl Into<String>, email: Email, credential: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email,
            credential: Zeroizing::new(credential.into()),
        }
    }

    /// Provider-assigned identifier.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// E-mail bound to the identity.
    pub const fn email(&self) -> &Email {
        &self.email
    }

    /// Provider-issued credential (for example an ID token).
    pub fn credential(&self) -> &str {
        self.credential.as_str()
    }
}

impl fmt::Debug for ExternalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("credential", &"<redacted>")
            .finish()
    }
}
