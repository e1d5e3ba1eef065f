//! Client-wide error taxonomy.
//!
//! Every failure the core can surface collapses onto [`ErrorKind`], a closed
//! set the UI matches exhaustively to pick between "redirect to login",
//! "render inline near the action", and "offer a retry".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The identity provider rejected the supplied credential.
    InvalidCredential,
    /// The first-party backend refused the request.
    BackendRejected,
    /// Network failure or timeout; safe to retry.
    Unavailable,
    /// No session token is held locally for the requested scope.
    Unauthenticated,
    /// The backend rejected the token; the session has been cleared.
    Unauthorized,
    /// The resource already exists (for example a second application).
    Conflict,
    /// Input was malformed and never left the client.
    Validation,
}

/// How the UI should react to a failure of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Send the user to the relevant login surface.
    RedirectToLogin,
    /// Render the message next to the action that triggered it.
    Inline,
    /// Show a generic message with a retry affordance.
    Retryable,
}

impl ErrorKind {
    /// Presentation policy for this kind.
    ///
    /// # Examples
    /// ```
    /// use scholarship_portal::domain::{ErrorKind, Presentation};
    ///
    /// assert_eq!(ErrorKind::Conflict.presentation(), Presentation::Inline);
    /// assert_eq!(ErrorKind::Unauthorized.presentation(), Presentation::RedirectToLogin);
    /// ```
    pub const fn presentation(self) -> Presentation {
        match self {
            Self::InvalidCredential | Self::Unauthenticated | Self::Unauthorized => {
                Presentation::RedirectToLogin
            }
            Self::Conflict | Self::Validation | Self::BackendRejected => Presentation::Inline,
            Self::Unavailable => Presentation::Retryable,
        }
    }

    /// Whether repeating the same request may succeed without user input.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidCredential => "invalid_credential",
            Self::BackendRejected => "backend_rejected",
            Self::Unavailable => "unavailable",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Validation => "validation",
        };
        f.write_str(label)
    }
}

/// Failure recorded on a slice after a dispatch settles.
///
/// ## Invariants
/// - `message` is never blank; constructors substitute a generic message
///   for the kind when given whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceError {
    kind: ErrorKind,
    message: String,
}

impl SliceError {
    /// Build an error, substituting a default message when `message` is blank.
    ///
    /// # Examples
    /// ```
    /// use scholarship_portal::domain::{ErrorKind, SliceError};
    ///
    /// let err = SliceError::new(ErrorKind::Conflict, "  ");
    /// assert_eq!(err.message(), "this has already been submitted");
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            default_message(kind).to_owned()
        } else {
            message
        };
        Self { kind, message }
    }

    /// Convenience constructor for [`ErrorKind::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Convenience constructor for [`ErrorKind::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Failure category.
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// User-facing message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SliceError {}

fn default_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidCredential => "the e-mail or password is incorrect",
        ErrorKind::BackendRejected => "something went wrong",
        ErrorKind::Unavailable => "the service is unreachable, please try again",
        ErrorKind::Unauthenticated => "please log in to continue",
        ErrorKind::Unauthorized => "your session has expired, please log in again",
        ErrorKind::Conflict => "this has already been submitted",
        ErrorKind::Validation => "some fields are invalid",
    }
}

#[cfg(test)]
mod tests;
