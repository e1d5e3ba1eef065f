//! Reconciliation flows against mocked provider and backend.

use std::sync::Arc;

use mockall::Sequence;
use rstest::rstest;
use serde_json::json;

use super::*;
use crate::domain::ports::{
    InMemorySessionStore, Method, MockIdentityProvider, MockTransport, RemoteResponse,
    TransportError,
};

fn credentials() -> Credentials {
    Credentials::try_from_parts("a@x.com", "secret1").expect("credentials")
}

fn identity() -> ExternalIdentity {
    ExternalIdentity::new("ext-1", Email::new("a@x.com").expect("email"), "id-token")
}

fn reconciler(
    provider: MockIdentityProvider,
    transport: MockTransport,
) -> (IdentityReconciler, Arc<InMemorySessionStore>) {
    let store = Arc::new(InMemorySessionStore::new());
    let client = RemoteResourceClient::new(Arc::new(transport), store.clone());
    (IdentityReconciler::new(Arc::new(provider), client), store)
}

fn token_response() -> Result<RemoteResponse, TransportError> {
    Ok(RemoteResponse::new(200, json!({ "token": "tok-1" })))
}

#[tokio::test]
async fn sign_in_stores_exactly_one_session() {
    let mut provider = MockIdentityProvider::new();
    provider
        .expect_sign_in()
        .times(1)
        .returning(|_| Ok(identity()));
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(|request| {
            request.method == Method::Post
                && request.path == "/auth/signin"
                && request.bearer.is_none()
                && request.body
                    == Some(json!({ "email": "a@x.com", "password": "secret1" }))
        })
        .times(1)
        .returning(|_| token_response());
    let (reconciler, store) = reconciler(provider, transport);

    let session = reconciler
        .sign_in(Role::User, &credentials())
        .await
        .expect("sign in");

    assert_eq!(session.token().expose(), "tok-1");
    assert_eq!(store.get(Role::User).expect("get"), Some(session));
    assert_eq!(store.get(Role::Admin).expect("get"), None);
}

#[tokio::test]
async fn rejected_credential_never_reaches_backend() {
    let mut provider = MockIdentityProvider::new();
    provider
        .expect_sign_in()
        .returning(|_| Err(IdentityProviderError::invalid_credential("INVALID_PASSWORD")));
    let mut transport = MockTransport::new();
    transport.expect_send().times(0);
    let (reconciler, store) = reconciler(provider, transport);

    let err = reconciler
        .sign_in(Role::Admin, &credentials())
        .await
        .expect_err("credential rejected");

    assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    assert_eq!(store.get(Role::Admin).expect("get"), None);
}

#[tokio::test]
async fn federated_sign_in_skips_the_password_step() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_sign_in().times(0);
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(|request| {
            request.body == Some(json!({ "email": "a@x.com", "isGoogleUser": true }))
        })
        .times(1)
        .returning(|_| token_response());
    let (reconciler, store) = reconciler(provider, transport);

    reconciler
        .sign_in_federated(&identity())
        .await
        .expect("federated sign in");

    assert!(store.get(Role::User).expect("get").is_some());
}

#[tokio::test]
async fn federated_sign_up_registers_without_a_provider_account() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_sign_up().times(0);
    provider.expect_sign_in().times(0);
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(|request| {
            request.path == "/auth/signup"
                && request.body
                    == Some(json!({
                        "email": "a@x.com",
                        "fullName": "Asha Rao",
                        "isGoogleUser": true,
                    }))
        })
        .times(1)
        .returning(|_| token_response());
    let (reconciler, store) = reconciler(provider, transport);
    let profile = SignUpProfile::user("Asha Rao").expect("profile");

    let session = reconciler
        .sign_up_federated(&identity(), &profile)
        .await
        .expect("federated sign up");

    assert_eq!(session.role(), Role::User);
    assert_eq!(store.get(Role::User).expect("get"), Some(session));
}

#[tokio::test]
async fn refused_federated_sign_up_deletes_nothing() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_delete().times(0);
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|_| {
        Ok(RemoteResponse::new(
            409,
            json!({ "message": "User already exists" }),
        ))
    });
    let (reconciler, store) = reconciler(provider, transport);
    let profile = SignUpProfile::user("Asha Rao").expect("profile");

    let err = reconciler
        .sign_up_federated(&identity(), &profile)
        .await
        .expect_err("backend refuses");

    assert_eq!(err.kind(), ErrorKind::BackendRejected);
    assert_eq!(store.get(Role::User).expect("get"), None);
}

#[tokio::test]
async fn admin_sign_up_sends_the_admin_code() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_sign_up().returning(|_| Ok(identity()));
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(|request| {
            request.path == "/admin/signup"
                && request.body
                    == Some(json!({
                        "email": "a@x.com",
                        "password": "secret1",
                        "fullName": "Asha Rao",
                        "adminCode": "ADM-42",
                    }))
        })
        .returning(|_| token_response());
    let (reconciler, store) = reconciler(provider, transport);
    let profile = SignUpProfile::admin("Asha Rao", "ADM-42").expect("profile");

    reconciler
        .sign_up(Role::Admin, &credentials(), &profile)
        .await
        .expect("sign up");

    assert!(store.get(Role::Admin).expect("get").is_some());
    assert_eq!(store.get(Role::User).expect("get"), None);
}

#[tokio::test]
async fn refused_sign_up_deletes_the_fresh_identity() {
    let mut seq = Sequence::new();
    let mut provider = MockIdentityProvider::new();
    provider
        .expect_sign_up()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(identity()));
    provider
        .expect_delete()
        .withf(|identity| identity.id() == "ext-1")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    let mut transport = MockTransport::new();
    transport.expect_send().returning(|_| {
        Ok(RemoteResponse::new(
            409,
            json!({ "message": "User already exists" }),
        ))
    });
    let (reconciler, store) = reconciler(provider, transport);
    let profile = SignUpProfile::user("Asha Rao").expect("profile");

    let err = reconciler
        .sign_up(Role::User, &credentials(), &profile)
        .await
        .expect_err("backend refused");

    assert_eq!(err.kind(), ErrorKind::BackendRejected);
    assert_eq!(store.get(Role::User).expect("get"), None);
}

#[tokio::test]
async fn failed_rollback_reports_both_failures() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_sign_up().returning(|_| Ok(identity()));
    provider
        .expect_delete()
        .returning(|_| Err(IdentityProviderError::rejected("TOKEN_EXPIRED")));
    let mut transport = MockTransport::new();
    transport.expect_send().returning(|_| {
        Ok(RemoteResponse::new(
            400,
            json!({ "message": "Invalid admin code" }),
        ))
    });
    let (reconciler, _store) = reconciler(provider, transport);
    let profile = SignUpProfile::admin("Asha Rao", "wrong").expect("profile");

    let err = reconciler
        .sign_up(Role::Admin, &credentials(), &profile)
        .await
        .expect_err("backend refused");

    assert!(matches!(err, AuthError::RollbackFailed { .. }));
    assert_eq!(err.kind(), ErrorKind::BackendRejected);
}

#[tokio::test]
async fn existing_provider_identity_falls_back_to_sign_in() {
    let mut provider = MockIdentityProvider::new();
    provider
        .expect_sign_up()
        .returning(|credentials| Err(IdentityProviderError::exists_for(credentials.email())));
    provider
        .expect_sign_in()
        .times(1)
        .returning(|_| Ok(identity()));
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(|request| request.path == "/auth/signup")
        .times(1)
        .returning(|_| token_response());
    let (reconciler, store) = reconciler(provider, transport);
    let profile = SignUpProfile::user("Asha Rao").expect("profile");

    reconciler
        .sign_up(Role::User, &credentials(), &profile)
        .await
        .expect("fallback sign up");

    assert!(store.get(Role::User).expect("get").is_some());
}

#[tokio::test]
async fn pre_existing_identity_is_not_rolled_back() {
    let mut provider = MockIdentityProvider::new();
    provider
        .expect_sign_up()
        .returning(|credentials| Err(IdentityProviderError::exists_for(credentials.email())));
    provider.expect_sign_in().returning(|_| Ok(identity()));
    provider.expect_delete().times(0);
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .returning(|_| Ok(RemoteResponse::new(409, json!({ "message": "exists" }))));
    let (reconciler, _store) = reconciler(provider, transport);
    let profile = SignUpProfile::user("Asha Rao").expect("profile");

    let err = reconciler
        .sign_up(Role::User, &credentials(), &profile)
        .await
        .expect_err("backend refused");

    assert!(matches!(err, AuthError::BackendRejected { .. }));
}

#[tokio::test]
async fn network_failure_skips_rollback() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_sign_up().returning(|_| Ok(identity()));
    provider.expect_delete().times(0);
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .returning(|_| Err(TransportError::timeout("30s elapsed")));
    let (reconciler, store) = reconciler(provider, transport);
    let profile = SignUpProfile::user("Asha Rao").expect("profile");

    let err = reconciler
        .sign_up(Role::User, &credentials(), &profile)
        .await
        .expect_err("timed out");

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(store.get(Role::User).expect("get"), None);
}

#[rstest]
#[case::short_password(Role::User, "12345", SignUpProfile::user("Asha Rao"))]
#[case::admin_without_code(Role::Admin, "secret1", SignUpProfile::user("Asha Rao"))]
#[tokio::test]
async fn invalid_sign_up_input_is_refused_locally(
    #[case] role: Role,
    #[case] password: &str,
    #[case] profile: Result<SignUpProfile, AuthValidationError>,
) {
    let mut provider = MockIdentityProvider::new();
    provider.expect_sign_up().times(0);
    let mut transport = MockTransport::new();
    transport.expect_send().times(0);
    let (reconciler, _store) = reconciler(provider, transport);
    let credentials = Credentials::try_from_parts("a@x.com", password).expect("credentials");
    let profile = profile.expect("profile");

    let err = reconciler
        .sign_up(role, &credentials, &profile)
        .await
        .expect_err("invalid input");

    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn sign_out_clears_sessions_even_when_provider_fails() {
    let mut provider = MockIdentityProvider::new();
    provider
        .expect_sign_out()
        .times(1)
        .returning(|| Err(IdentityProviderError::unavailable("offline")));
    let (reconciler, store) = reconciler(provider, MockTransport::new());
    for role in Role::ALL {
        let session = Session::new(
            role,
            SessionToken::new("tok").expect("token"),
            Email::new("a@x.com").expect("email"),
        );
        store.set(role, &session).expect("seed");
    }

    reconciler.sign_out().await.expect("sign out");

    for role in Role::ALL {
        assert_eq!(store.get(role).expect("get"), None);
    }
}
