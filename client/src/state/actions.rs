//! Portal operations: remote calls routed through the shared store.
//!
//! Each operation picks a slice, an intent, and the remote call that
//! resolves it. Fetches replace their slice; save and unsave patch it
//! optimistically; apply and create patch it once the backend confirms.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::{info, warn};

use super::consumer::ConsumerId;
use super::pipeline::{Intent, Settlement};
use super::slice::Mutation;
use super::store::{AuthStatus, ClientStateStore, PortalState};
use crate::domain::{
    Application, ApplicationLifecycle, CallScope, Credentials, DemographicProfile, Endpoint,
    ErrorKind, ExternalIdentity, HttpError, IdentityReconciler, NewScholarship, Observation,
    RemoteResourceClient, Role, SavedMark, Scholarship, ScholarshipFilter, ScholarshipId, Session,
    SignUpProfile, SliceError,
};

/// Saved-scholarship payload as returned by the backend.
#[derive(Deserialize)]
struct SavedEntry {
    #[serde(default)]
    scholarship: Option<Scholarship>,
}

/// Entry point for every portal operation.
#[derive(Clone)]
pub struct PortalActions {
    client: RemoteResourceClient,
    reconciler: IdentityReconciler,
    store: Arc<ClientStateStore>,
}

impl PortalActions {
    /// Wire actions to the remote client, reconciler, and shared store.
    pub fn new(
        client: RemoteResourceClient,
        reconciler: IdentityReconciler,
        store: Arc<ClientStateStore>,
    ) -> Self {
        Self {
            client,
            reconciler,
            store,
        }
    }

    /// Shared state written by these actions.
    pub const fn store(&self) -> &Arc<ClientStateStore> {
        &self.store
    }

    /// Resolve the initial `Unknown` status from the durable session store.
    pub fn restore_session(&self) -> AuthStatus {
        let roles = self.held_roles();
        self.store.update_auth(|auth| auth.resolve(roles));
        self.store.read(|state| state.auth().status())
    }

    /// Sign in as `role`.
    pub async fn sign_in(&self, role: Role, credentials: &Credentials) -> Result<Session, SliceError> {
        self.store.update_auth(|auth| auth.begin());
        let outcome = self.reconciler.sign_in(role, credentials).await;
        self.record_auth(outcome)
    }

    /// Register as `role`.
    pub async fn sign_up(
        &self,
        role: Role,
        credentials: &Credentials,
        profile: &SignUpProfile,
    ) -> Result<Session, SliceError> {
        self.store.update_auth(|auth| auth.begin());
        let outcome = self.reconciler.sign_up(role, credentials, profile).await;
        self.record_auth(outcome)
    }

    /// Exchange a federated identity for a user session.
    pub async fn sign_in_federated(&self, identity: &ExternalIdentity) -> Result<Session, SliceError> {
        self.store.update_auth(|auth| auth.begin());
        let outcome = self.reconciler.sign_in_federated(identity).await;
        self.record_auth(outcome)
    }

    /// Register a federated identity as a user and store the session.
    pub async fn sign_up_federated(
        &self,
        identity: &ExternalIdentity,
        profile: &SignUpProfile,
    ) -> Result<Session, SliceError> {
        self.store.update_auth(|auth| auth.begin());
        let outcome = self.reconciler.sign_up_federated(identity, profile).await;
        self.record_auth(outcome)
    }

    /// Drop every session and the user's cached data.
    pub async fn sign_out(&self) -> Result<(), SliceError> {
        let outcome = self.reconciler.sign_out().await.map_err(SliceError::from);
        self.store.reset_user_data();
        self.restore_session();
        outcome
    }

    /// Clear the error left by the last failed auth flow.
    pub fn clear_auth_error(&self) {
        self.store.update_auth(|auth| auth.clear_error());
    }

    /// Replace the catalogue with the scholarships matching `filter`.
    pub async fn fetch_scholarships(
        &self,
        filter: &ScholarshipFilter,
        consumer: Option<ConsumerId>,
    ) -> Settlement {
        let query = filter
            .to_query()
            .map_err(|error| SliceError::validation(error.to_string()));
        let settlement = self
            .store
            .dispatch(PortalState::catalogue_mut, Intent::Replace, consumer, async {
                let endpoint = Endpoint::scholarships(query?);
                let items: Vec<Scholarship> =
                    self.client.call(&endpoint, CallScope::Optional).await?;
                Ok::<_, SliceError>(Some(Mutation::Replace(items)))
            })
            .await;
        self.after(settlement)
    }

    /// Fetch one scholarship into the details slice.
    pub async fn fetch_scholarship(
        &self,
        id: &ScholarshipId,
        consumer: Option<ConsumerId>,
    ) -> Settlement {
        let settlement = self
            .store
            .dispatch(PortalState::details_mut, Intent::Patch, consumer, async {
                let item: Scholarship = self
                    .client
                    .call(&Endpoint::scholarship(id), CallScope::None)
                    .await?;
                Ok::<_, SliceError>(Some(Mutation::upsert(item)))
            })
            .await;
        self.after(settlement)
    }

    /// Replace the saved slice with the user's saved scholarships.
    pub async fn fetch_saved(&self, consumer: Option<ConsumerId>) -> Settlement {
        let settlement = self
            .store
            .dispatch(PortalState::saved_mut, Intent::Replace, consumer, async {
                let entries: Vec<SavedEntry> = self
                    .client
                    .call(&Endpoint::saved_scholarships(), CallScope::User)
                    .await?;
                let marks = entries
                    .into_iter()
                    .filter_map(|entry| entry.scholarship)
                    .map(SavedMark::for_scholarship)
                    .collect();
                Ok::<_, SliceError>(Some(Mutation::Replace(marks)))
            })
            .await;
        self.after(settlement)
    }

    /// Save `id`. Saving an already saved scholarship is a no-op.
    pub async fn save_scholarship(
        &self,
        id: &ScholarshipId,
        consumer: Option<ConsumerId>,
    ) -> Settlement {
        if self.store.read(|state| state.saved().contains(id)) {
            return Settlement::Applied;
        }
        let mark = self.store.read(|state| {
            state
                .catalogue()
                .get(id)
                .or_else(|| state.details().get(id))
                .cloned()
                .map_or_else(|| SavedMark::bare(id.clone()), SavedMark::for_scholarship)
        });
        let settlement = self
            .store
            .dispatch(
                PortalState::saved_mut,
                Intent::Optimistic(Mutation::upsert(mark)),
                consumer,
                async {
                    let confirmed: Option<SavedEntry> = self
                        .client
                        .call(&Endpoint::save_scholarship(id), CallScope::User)
                        .await?;
                    Ok::<_, SliceError>(confirmed
                        .and_then(|entry| entry.scholarship)
                        .filter(|scholarship| &scholarship.id == id)
                        .map(|scholarship| Mutation::upsert(SavedMark::for_scholarship(scholarship))))
                },
            )
            .await;
        self.after(settlement)
    }

    /// Unsave `id`. Unsaving a scholarship that is not saved is a no-op.
    pub async fn unsave_scholarship(
        &self,
        id: &ScholarshipId,
        consumer: Option<ConsumerId>,
    ) -> Settlement {
        if !self.store.read(|state| state.saved().contains(id)) {
            return Settlement::Applied;
        }
        let settlement = self
            .store
            .dispatch(
                PortalState::saved_mut,
                Intent::Optimistic(Mutation::Remove(id.clone())),
                consumer,
                async {
                    let _: IgnoredAny = self
                        .client
                        .call(&Endpoint::unsave_scholarship(id), CallScope::User)
                        .await?;
                    Ok::<_, SliceError>(None)
                },
            )
            .await;
        self.after(settlement)
    }

    /// Save `id` if it is not saved, unsave it otherwise.
    pub async fn toggle_saved(
        &self,
        id: &ScholarshipId,
        consumer: Option<ConsumerId>,
    ) -> Settlement {
        if self.store.read(|state| state.saved().contains(id)) {
            self.unsave_scholarship(id, consumer).await
        } else {
            self.save_scholarship(id, consumer).await
        }
    }

    /// Replace the applications slice, logging any status change the
    /// lifecycle does not allow.
    pub async fn fetch_applications(&self, consumer: Option<ConsumerId>) -> Settlement {
        let settlement = self
            .store
            .dispatch(PortalState::applications_mut, Intent::Replace, consumer, async {
                let refreshed: Vec<Application> = self
                    .client
                    .call(&Endpoint::applications(), CallScope::User)
                    .await?;
                let cached = self.store.read(|state| state.applications().items().to_vec());
                for (id, observation) in ApplicationLifecycle::observe_listed(&cached, &refreshed) {
                    report(&id.to_string(), observation);
                }
                Ok::<_, SliceError>(Some(Mutation::Replace(refreshed)))
            })
            .await;
        self.after(settlement)
    }

    /// Apply for `id`.
    ///
    /// Fails with [`ErrorKind::Conflict`] without a network call when an
    /// application for `id` is already cached; a duplicate refused by the
    /// backend is reported the same way.
    pub async fn apply_for_scholarship(
        &self,
        id: &ScholarshipId,
        consumer: Option<ConsumerId>,
    ) -> Settlement {
        let duplicate = self.store.read(|state| {
            ApplicationLifecycle::already_applied(state.applications().items(), id)
        });
        let settlement = self
            .store
            .dispatch(PortalState::applications_mut, Intent::Patch, consumer, async {
                if duplicate {
                    return Err(SliceError::conflict(""));
                }
                let created: Application = self
                    .client
                    .call(&Endpoint::apply(id), CallScope::User)
                    .await
                    .map_err(application_error)?;
                report(created.id.as_ref(), ApplicationLifecycle::observe(None, &created));
                Ok::<_, SliceError>(Some(Mutation::upsert(created)))
            })
            .await;
        self.after(settlement)
    }

    /// Create a scholarship as admin and prepend it to the catalogue.
    pub async fn create_scholarship(
        &self,
        scholarship: &NewScholarship,
        consumer: Option<ConsumerId>,
    ) -> Settlement {
        let settlement = self
            .store
            .dispatch(PortalState::catalogue_mut, Intent::Patch, consumer, async {
                let created: Scholarship = self
                    .client
                    .call_json(&Endpoint::create_scholarship(), CallScope::Admin, scholarship)
                    .await?;
                info!(id = %created.id, draft = created.is_draft, "scholarship created");
                Ok::<_, SliceError>(Some(Mutation::prepend(created)))
            })
            .await;
        self.after(settlement)
    }

    /// Submit the demographic profile completed after sign-up.
    pub async fn complete_profile(&self, profile: &DemographicProfile) -> Result<(), SliceError> {
        let outcome: Result<IgnoredAny, HttpError> = self
            .client
            .call_json(&Endpoint::profile(), CallScope::User, profile)
            .await;
        match outcome {
            Ok(_) => Ok(()),
            Err(error) => {
                let error = SliceError::from(error);
                self.after(Settlement::Failed(error.clone()));
                Err(error)
            }
        }
    }

    fn held_roles(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| match self.client.sessions().get(*role) {
                Ok(session) => session.is_some(),
                Err(error) => {
                    warn!(%role, %error, "session slot unreadable; treating as signed out");
                    false
                }
            })
            .collect()
    }

    fn record_auth<E>(&self, outcome: Result<Session, E>) -> Result<Session, SliceError>
    where
        SliceError: From<E>,
    {
        match outcome {
            Ok(session) => {
                let role = session.role();
                self.store.update_auth(|auth| auth.succeed(role));
                Ok(session)
            }
            Err(error) => {
                let error = SliceError::from(error);
                let reported = error.clone();
                self.store.update_auth(|auth| auth.fail(reported));
                Err(error)
            }
        }
    }

    /// Re-read held sessions after the backend rejected a token.
    fn after(&self, settlement: Settlement) -> Settlement {
        if let Settlement::Failed(error) = &settlement {
            if matches!(error.kind(), ErrorKind::Unauthorized | ErrorKind::Unauthenticated) {
                self.restore_session();
            }
        }
        settlement
    }
}

fn application_error(error: HttpError) -> SliceError {
    match error {
        HttpError::Conflict { message } | HttpError::Validation { message } => {
            SliceError::conflict(message)
        }
        other => SliceError::from(other),
    }
}

fn report(id: &str, observation: Observation) {
    if let Observation::Illegal { from, to } = observation {
        warn!(application = id, ?from, %to, "backend reported a status change the lifecycle forbids");
    }
}
