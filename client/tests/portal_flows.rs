//! End-to-end portal flows against the in-memory backend and provider.
//!
//! These tests wire the real reconciler, resource client, and state store to
//! the `test-support` doubles, so every request goes through the same code
//! path the CLI uses.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};

use scholarship_portal::domain::ports::{InMemorySessionStore, Method, SessionStore};
use scholarship_portal::domain::{
    ApplicationStatus, Caste, Category, Credentials, DemographicProfile, Eligibility, Email,
    ErrorKind, ExternalIdentity, IdentityReconciler, NewScholarship, RemoteResourceClient, Role, ScholarshipDraft,
    ScholarshipFilter, ScholarshipId, SignUpProfile,
};
use scholarship_portal::outbound::FileSessionStore;
use scholarship_portal::state::{ClientStateStore, PortalActions, Settlement};
use scholarship_portal::test_support::{
    ADMIN_CODE, InMemoryBackend, InMemoryIdentityProvider, sample_scholarship,
};
use scholarship_portal::{AuthStatus, GuardDecision, RouteGuard};

struct Portal {
    backend: Arc<InMemoryBackend>,
    provider: Arc<InMemoryIdentityProvider>,
    sessions: Arc<dyn SessionStore>,
    actions: PortalActions,
}

impl Portal {
    fn wire(backend: Arc<InMemoryBackend>, sessions: Arc<dyn SessionStore>) -> Self {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let client = RemoteResourceClient::new(backend.clone(), Arc::clone(&sessions));
        let reconciler = IdentityReconciler::new(provider.clone(), client.clone());
        let actions = PortalActions::new(client, reconciler, Arc::new(ClientStateStore::new()));
        Self {
            backend,
            provider,
            sessions,
            actions,
        }
    }

    fn catalogue_ids(&self) -> Vec<String> {
        self.actions.store().read(|state| {
            state
                .catalogue()
                .items()
                .iter()
                .map(|item| item.id.to_string())
                .collect()
        })
    }

    fn application_count(&self) -> usize {
        self.actions
            .store()
            .read(|state| state.applications().items().len())
    }
}

fn id(raw: &str) -> ScholarshipId {
    ScholarshipId::new(raw).expect("valid id")
}

fn credentials() -> Credentials {
    Credentials::try_from_parts("a@x.com", "secret-pass").expect("valid credentials")
}

fn user_profile() -> SignUpProfile {
    SignUpProfile::user("Asha Rao").expect("valid profile")
}

#[fixture]
fn portal() -> Portal {
    let backend = Arc::new(InMemoryBackend::with_scholarships([
        sample_scholarship(id("sch-1"), Category::Government, 5000),
        sample_scholarship(id("sch-2"), Category::Private, 12000),
        sample_scholarship(id("sch-3"), Category::State, 800),
    ]));
    Portal::wire(backend, Arc::new(InMemorySessionStore::new()))
}

#[rstest]
#[tokio::test]
async fn sign_up_browse_save_and_apply(portal: Portal) {
    let session = portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");
    assert_eq!(session.role(), Role::User);
    assert_eq!(session.subject_email().as_ref(), "a@x.com");

    let listed = portal
        .actions
        .fetch_scholarships(&ScholarshipFilter::default(), None)
        .await;
    assert_eq!(listed, Settlement::Applied);
    assert_eq!(portal.catalogue_ids(), ["sch-1", "sch-2", "sch-3"]);

    assert_eq!(
        portal.actions.save_scholarship(&id("sch-1"), None).await,
        Settlement::Applied
    );
    assert_eq!(
        portal.actions.apply_for_scholarship(&id("sch-1"), None).await,
        Settlement::Applied
    );
    let status = portal
        .actions
        .store()
        .read(|state| state.applications().items().first().map(|item| item.status));
    assert_eq!(status, Some(ApplicationStatus::Pending));

    let repeat = portal.actions.apply_for_scholarship(&id("sch-1"), None).await;
    let Settlement::Failed(error) = repeat else {
        panic!("repeat apply should fail, got {repeat:?}");
    };
    assert_eq!(error.kind(), ErrorKind::Conflict);
    assert_eq!(portal.application_count(), 1);
    assert_eq!(portal.backend.applications_of("a@x.com").len(), 1);
    assert_eq!(portal.backend.count(Method::Post, "/user/applications/sch-1"), 1);
}

#[rstest]
#[tokio::test]
async fn backend_duplicate_refusal_maps_to_conflict(portal: Portal) {
    portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");
    portal
        .actions
        .apply_for_scholarship(&id("sch-2"), None)
        .await;

    // A second client has not cached the first application.
    let second = Portal::wire(portal.backend.clone(), Arc::clone(&portal.sessions));
    let outcome = second.actions.apply_for_scholarship(&id("sch-2"), None).await;

    let Settlement::Failed(error) = outcome else {
        panic!("backend should refuse the duplicate, got {outcome:?}");
    };
    assert_eq!(error.kind(), ErrorKind::Conflict);
    assert_eq!(error.message(), "Already applied for this scholarship");
    assert_eq!(second.application_count(), 0);
}

#[rstest]
#[tokio::test]
async fn save_and_unsave_are_idempotent(portal: Portal) {
    portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");

    for _ in 0..2 {
        portal.actions.save_scholarship(&id("sch-3"), None).await;
    }
    assert_eq!(
        portal.backend.count(Method::Post, "/user/saved-scholarships/sch-3"),
        1
    );

    for _ in 0..2 {
        portal.actions.unsave_scholarship(&id("sch-3"), None).await;
    }
    assert_eq!(
        portal
            .backend
            .count(Method::Delete, "/user/saved-scholarships/sch-3"),
        1
    );

    portal.actions.fetch_saved(None).await;
    let saved = portal
        .actions
        .store()
        .read(|state| state.saved().items().len());
    assert_eq!(saved, 0);
}

#[rstest]
#[tokio::test]
async fn later_listing_wins_over_slower_earlier_one(portal: Portal) {
    portal
        .backend
        .delay_reads("/scholarships", [Duration::from_millis(60), Duration::ZERO]);
    let government = ScholarshipFilter {
        category: Some(Category::Government),
        ..ScholarshipFilter::default()
    };
    let private = ScholarshipFilter {
        category: Some(Category::Private),
        ..ScholarshipFilter::default()
    };

    let (first, second) = tokio::join!(
        portal.actions.fetch_scholarships(&government, None),
        portal.actions.fetch_scholarships(&private, None),
    );

    assert_eq!(first, Settlement::Stale);
    assert_eq!(second, Settlement::Applied);
    assert_eq!(portal.catalogue_ids(), ["sch-2"]);
    let loading = portal
        .actions
        .store()
        .read(|state| state.catalogue().loading());
    assert!(!loading);
}

#[rstest]
#[tokio::test]
async fn federated_sign_up_registers_only_with_the_backend(portal: Portal) {
    let email = Email::new("g@x.com").expect("email");
    let identity = ExternalIdentity::new("google-1", email.clone(), "google-token");

    let session = portal
        .actions
        .sign_up_federated(&identity, &user_profile())
        .await
        .expect("federated sign-up succeeds");

    assert_eq!(session.role(), Role::User);
    assert!(portal.backend.has_member(Role::User, "g@x.com"));
    assert!(!portal.provider.has_account(&email));
    let saved = portal.actions.fetch_saved(None).await;
    assert_eq!(saved, Settlement::Applied);
}

#[rstest]
#[tokio::test]
async fn refused_sign_up_removes_the_new_identity(portal: Portal) {
    portal.backend.refuse_sign_ups(409, "User already exists");

    let error = portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect_err("backend refuses");

    assert_eq!(error.kind(), ErrorKind::BackendRejected);
    assert!(!portal.provider.has_account(credentials().email()));
    assert_eq!(portal.sessions.get(Role::User).expect("read"), None);
    let status = portal.actions.store().read(|state| state.auth().status());
    assert_eq!(status, AuthStatus::Unauthenticated);
}

#[rstest]
#[tokio::test]
async fn failed_rollback_is_reported(portal: Portal) {
    portal.backend.refuse_sign_ups(500, "database down");
    portal.provider.refuse_deletes(true);

    let error = portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect_err("backend refuses");

    assert_eq!(error.kind(), ErrorKind::BackendRejected);
    assert!(portal.provider.has_account(credentials().email()));
    assert_eq!(portal.sessions.get(Role::User).expect("read"), None);
}

#[rstest]
#[tokio::test]
async fn unreachable_backend_leaves_no_session(portal: Portal) {
    portal
        .provider
        .seed_account(credentials().email(), credentials().password());
    portal.backend.set_offline(true);

    let error = portal
        .actions
        .sign_in(Role::User, &credentials())
        .await
        .expect_err("backend offline");

    assert_eq!(error.kind(), ErrorKind::Unavailable);
    assert!(error.kind().is_retryable());
    assert_eq!(portal.sessions.get(Role::User).expect("read"), None);
}

#[rstest]
#[tokio::test]
async fn rejected_token_clears_the_session_and_closes_the_guard(portal: Portal) {
    portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");
    let mut guard = RouteGuard::new(Arc::clone(&portal.sessions));
    guard.resolve();
    assert_eq!(guard.authorize(Role::User, "/saved"), GuardDecision::Allow);

    portal.backend.revoke_all_tokens();
    let outcome = portal.actions.fetch_saved(None).await;

    let Settlement::Failed(error) = outcome else {
        panic!("revoked token should fail, got {outcome:?}");
    };
    assert_eq!(error.kind(), ErrorKind::Unauthorized);
    assert_eq!(portal.sessions.get(Role::User).expect("read"), None);
    let status = portal.actions.store().read(|state| state.auth().status());
    assert_eq!(status, AuthStatus::Unauthenticated);
    assert_eq!(
        guard.authorize(Role::User, "/saved"),
        GuardDecision::Deny {
            redirect_to: "/login",
            return_to: "/saved".to_owned(),
        }
    );
    assert_eq!(guard.take_return_to(Role::User), "/saved");
}

#[rstest]
#[tokio::test]
async fn admin_sessions_are_independent_of_user_sessions(portal: Portal) {
    let admin_credentials =
        Credentials::try_from_parts("admin@x.com", "admin-pass").expect("valid credentials");
    portal
        .actions
        .sign_up(
            Role::Admin,
            &admin_credentials,
            &SignUpProfile::admin("Portal Admin", ADMIN_CODE).expect("valid profile"),
        )
        .await
        .expect("admin sign-up succeeds");
    portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("user sign-up succeeds");

    let draft = NewScholarship::try_from_draft(ScholarshipDraft {
        name: "Research Grant",
        description: "For final-year projects",
        amount: 20000,
        deadline: Utc
            .with_ymd_and_hms(2027, 3, 31, 0, 0, 0)
            .single()
            .expect("valid deadline"),
        category: Category::Private,
        eligibility: Eligibility::default(),
        institution: "Tech Institute",
        apply_link: "https://example.org/grant",
        is_draft: false,
    })
    .expect("valid draft");
    portal
        .actions
        .fetch_scholarships(&ScholarshipFilter::default(), None)
        .await;
    let created = portal.actions.create_scholarship(&draft, None).await;

    assert_eq!(created, Settlement::Applied);
    let ids = portal.catalogue_ids();
    assert_eq!(ids.len(), 4);
    assert!(ids.first().is_some_and(|first| first.starts_with("sch-created")));

    portal.sessions.clear(Role::Admin).expect("clear admin");
    assert!(portal.sessions.get(Role::User).expect("read").is_some());
    assert_eq!(portal.actions.restore_session(), AuthStatus::Authenticated);
    let roles: Vec<Role> = portal
        .actions
        .store()
        .read(|state| state.auth().roles().collect());
    assert_eq!(roles, [Role::User]);
}

#[rstest]
#[tokio::test]
async fn sign_out_drops_sessions_and_user_data(portal: Portal) {
    portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");
    portal.actions.save_scholarship(&id("sch-1"), None).await;
    portal.actions.apply_for_scholarship(&id("sch-1"), None).await;

    portal.actions.sign_out().await.expect("sign-out succeeds");

    let (saved, applications, status) = portal.actions.store().read(|state| {
        (
            state.saved().items().len(),
            state.applications().items().len(),
            state.auth().status(),
        )
    });
    assert_eq!((saved, applications), (0, 0));
    assert_eq!(status, AuthStatus::Unauthenticated);
    assert_eq!(portal.sessions.get(Role::User).expect("read"), None);
    assert_eq!(portal.provider.sign_outs(), 1);
}

#[rstest]
#[tokio::test]
async fn saved_fetch_in_flight_during_sign_out_is_dropped(portal: Portal) {
    portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");
    portal.actions.save_scholarship(&id("sch-1"), None).await;
    portal
        .backend
        .delay_reads("/user/saved-scholarships", [Duration::from_millis(60)]);

    let (fetched, signed_out) = tokio::join!(portal.actions.fetch_saved(None), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        portal.actions.sign_out().await
    });

    signed_out.expect("sign-out succeeds");
    assert_eq!(fetched, Settlement::Stale);
    let (saved, loading) = portal
        .actions
        .store()
        .read(|state| (state.saved().items().len(), state.saved().loading()));
    assert_eq!(saved, 0);
    assert!(!loading);
}

#[rstest]
#[tokio::test]
async fn reviewed_applications_refresh_in_place(portal: Portal) {
    portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");
    portal.actions.apply_for_scholarship(&id("sch-3"), None).await;
    let application_id = portal
        .actions
        .store()
        .read(|state| state.applications().items().first().map(|item| item.id.clone()))
        .expect("application cached");

    portal
        .backend
        .review(&application_id, ApplicationStatus::Approved);
    portal.actions.fetch_applications(None).await;

    let (status, title) = portal
        .actions
        .store()
        .read(|state| {
            state
                .applications()
                .get(&application_id)
                .map(|item| (item.status, item.scholarship.as_ref().map(|s| s.name.clone())))
        })
        .expect("application still cached");
    assert_eq!(status, ApplicationStatus::Approved);
    assert_eq!(title.as_deref(), Some("Scholarship sch-3"));
}

#[rstest]
#[tokio::test]
async fn torn_down_consumer_leaves_the_slice_untouched(portal: Portal) {
    let consumer = portal.actions.store().register_consumer();
    portal.actions.store().teardown(consumer);

    let outcome = portal
        .actions
        .fetch_scholarships(&ScholarshipFilter::default(), Some(consumer))
        .await;

    assert_eq!(outcome, Settlement::Abandoned);
    assert!(portal.catalogue_ids().is_empty());
}

#[rstest]
#[tokio::test]
async fn profile_reaches_the_backend(portal: Portal) {
    portal
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");
    let profile = DemographicProfile::new(Caste::Obc, "Hindu", "Undergraduate").expect("valid");

    portal
        .actions
        .complete_profile(&profile)
        .await
        .expect("profile accepted");

    let stored = portal.backend.profile_of("a@x.com").expect("profile stored");
    assert_eq!(stored["caste"], "obc");
    assert_eq!(stored["educationLevel"], "Undergraduate");
}

#[tokio::test]
async fn file_sessions_survive_a_restart() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = Utf8Path::from_path(root.path())
        .expect("utf-8 temp path")
        .join("sessions");
    let backend = Arc::new(InMemoryBackend::new());

    let first = Portal::wire(
        backend.clone(),
        Arc::new(FileSessionStore::open(&dir).expect("open store")),
    );
    first
        .actions
        .sign_up(Role::User, &credentials(), &user_profile())
        .await
        .expect("sign-up succeeds");
    drop(first);

    let reopened = Portal::wire(
        backend,
        Arc::new(FileSessionStore::open(&dir).expect("reopen store")),
    );
    assert_eq!(reopened.actions.restore_session(), AuthStatus::Authenticated);
    let held = reopened.sessions.get(Role::User).expect("read");
    assert_eq!(
        held.map(|session| session.subject_email().clone()),
        Some(Email::new("a@x.com").expect("email"))
    );
    let mut guard = RouteGuard::new(Arc::clone(&reopened.sessions));
    assert_eq!(guard.authorize(Role::User, "/dashboard"), GuardDecision::Pending);
    guard.resolve();
    assert_eq!(guard.authorize(Role::User, "/dashboard"), GuardDecision::Allow);
    assert!(matches!(
        guard.authorize(Role::Admin, "/admin/dashboard"),
        GuardDecision::Deny { .. }
    ));
}
