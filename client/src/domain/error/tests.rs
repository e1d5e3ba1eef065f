//! Tests for the error taxonomy.

use rstest::rstest;

use super::*;

#[rstest]
#[case(ErrorKind::InvalidCredential, Presentation::RedirectToLogin)]
#[case(ErrorKind::Unauthenticated, Presentation::RedirectToLogin)]
#[case(ErrorKind::Unauthorized, Presentation::RedirectToLogin)]
#[case(ErrorKind::Conflict, Presentation::Inline)]
#[case(ErrorKind::Validation, Presentation::Inline)]
#[case(ErrorKind::Unavailable, Presentation::Retryable)]
fn presentation_follows_kind(#[case] kind: ErrorKind, #[case] expected: Presentation) {
    assert_eq!(kind.presentation(), expected);
}

#[test]
fn only_unavailable_is_retryable() {
    assert!(ErrorKind::Unavailable.is_retryable());
    assert!(!ErrorKind::Conflict.is_retryable());
    assert!(!ErrorKind::Unauthorized.is_retryable());
}

#[test]
fn blank_messages_fall_back_to_kind_default() {
    let err = SliceError::new(ErrorKind::Unavailable, "");
    assert_eq!(err.message(), "the service is unreachable, please try again");
}

#[test]
fn explicit_messages_are_kept() {
    let err = SliceError::conflict("already applied");
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "conflict: already applied");
}

#[test]
fn kind_serialises_as_snake_case() {
    let json = serde_json::to_string(&ErrorKind::InvalidCredential).expect("serialise kind");
    assert_eq!(json, "\"invalid_credential\"");
}
