//! Shared client state: one pipeline per resource collection plus the
//! authentication status.
//!
//! The store is injected into every consumer. Its lock is only held for the
//! synchronous begin/settle steps, never across a remote call.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::consumer::{ConsumerId, ConsumerRegistry};
use super::pipeline::{Intent, Settlement, SlicePipeline, Ticket};
use super::slice::{CollectionSlice, Keyed, Mutation};
use crate::domain::{Application, Role, SavedMark, Scholarship, SliceError};

/// Three-state authentication status.
///
/// Views render a neutral placeholder while `Unknown` rather than assuming
/// the visitor is signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// The first session check has not resolved yet.
    #[default]
    Unknown,
    /// At least one role holds a session.
    Authenticated,
    /// No session is held.
    Unauthenticated,
}

/// Authentication slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    status: AuthStatus,
    roles: BTreeSet<Role>,
    loading: bool,
    error: Option<SliceError>,
}

impl AuthState {
    /// Current status.
    pub const fn status(&self) -> AuthStatus {
        self.status
    }

    /// Roles currently holding a session.
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }

    /// Whether `role` holds a session.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Whether a sign-in or sign-up is outstanding.
    pub const fn loading(&self) -> bool {
        self.loading
    }

    /// Error from the last failed auth flow.
    pub const fn error(&self) -> Option<&SliceError> {
        self.error.as_ref()
    }

    pub(crate) const fn begin(&mut self) {
        self.loading = true;
    }

    pub(crate) fn resolve(&mut self, roles: impl IntoIterator<Item = Role>) {
        self.roles = roles.into_iter().collect();
        self.status = if self.roles.is_empty() {
            AuthStatus::Unauthenticated
        } else {
            AuthStatus::Authenticated
        };
    }

    pub(crate) fn succeed(&mut self, role: Role) {
        self.roles.insert(role);
        self.status = AuthStatus::Authenticated;
        self.loading = false;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: SliceError) {
        if self.roles.is_empty() {
            self.status = AuthStatus::Unauthenticated;
        }
        self.loading = false;
        self.error = Some(error);
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Every slice the portal caches.
#[derive(Debug, Default)]
pub struct PortalState {
    catalogue: SlicePipeline<Scholarship>,
    details: SlicePipeline<Scholarship>,
    saved: SlicePipeline<SavedMark>,
    applications: SlicePipeline<Application>,
    auth: AuthState,
    consumers: ConsumerRegistry,
}

/// Named accessor selecting one pipeline out of [`PortalState`].
pub type SliceAccessor<T> = fn(&mut PortalState) -> &mut SlicePipeline<T>;

impl PortalState {
    /// Scholarship list as last fetched, plus admin-created entries.
    pub const fn catalogue(&self) -> &CollectionSlice<Scholarship> {
        self.catalogue.slice()
    }

    /// Individually fetched scholarships.
    pub const fn details(&self) -> &CollectionSlice<Scholarship> {
        self.details.slice()
    }

    /// The user's saved scholarships.
    pub const fn saved(&self) -> &CollectionSlice<SavedMark> {
        self.saved.slice()
    }

    /// The user's applications.
    pub const fn applications(&self) -> &CollectionSlice<Application> {
        self.applications.slice()
    }

    /// Authentication slice.
    pub const fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Accessor for the catalogue pipeline.
    pub fn catalogue_mut(&mut self) -> &mut SlicePipeline<Scholarship> {
        &mut self.catalogue
    }

    /// Accessor for the details pipeline.
    pub fn details_mut(&mut self) -> &mut SlicePipeline<Scholarship> {
        &mut self.details
    }

    /// Accessor for the saved pipeline.
    pub fn saved_mut(&mut self) -> &mut SlicePipeline<SavedMark> {
        &mut self.saved
    }

    /// Accessor for the applications pipeline.
    pub fn applications_mut(&mut self) -> &mut SlicePipeline<Application> {
        &mut self.applications
    }
}

/// Injectable container for [`PortalState`].
#[derive(Debug, Default)]
pub struct ClientStateStore {
    state: Mutex<PortalState>,
}

impl ClientStateStore {
    /// Empty store with authentication status `Unknown`.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PortalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a projection of the current state.
    pub fn read<R>(&self, view: impl FnOnce(&PortalState) -> R) -> R {
        view(&*self.lock())
    }

    /// Register a consumer whose results should be dropped once it is torn
    /// down.
    pub fn register_consumer(&self) -> ConsumerId {
        self.lock().consumers.register()
    }

    /// Tear `consumer` down; its in-flight results will be ignored.
    pub fn teardown(&self, consumer: ConsumerId) {
        self.lock().consumers.teardown(consumer);
    }

    /// Start an operation on the slice chosen by `slice`.
    pub fn begin<T: Keyed>(
        &self,
        slice: SliceAccessor<T>,
        intent: Intent<T>,
        consumer: Option<ConsumerId>,
    ) -> Ticket<T> {
        slice(&mut *self.lock()).begin(intent, consumer)
    }

    /// Settle a ticket previously returned by [`Self::begin`].
    pub fn settle<T: Keyed>(
        &self,
        slice: SliceAccessor<T>,
        ticket: Ticket<T>,
        outcome: Result<Option<Mutation<T>>, SliceError>,
    ) -> Settlement {
        let mut state = self.lock();
        let live = state.consumers.is_live(ticket.consumer());
        slice(&mut *state).settle(ticket, outcome, live)
    }

    /// Begin, await `operation`, then settle.
    pub async fn dispatch<T, F>(
        &self,
        slice: SliceAccessor<T>,
        intent: Intent<T>,
        consumer: Option<ConsumerId>,
        operation: F,
    ) -> Settlement
    where
        T: Keyed,
        F: Future<Output = Result<Option<Mutation<T>>, SliceError>>,
    {
        let ticket = self.begin(slice, intent, consumer);
        let outcome = operation.await;
        self.settle(slice, ticket, outcome)
    }

    /// Drop the error carried by the slice chosen by `slice`.
    pub fn clear_error<T: Keyed>(&self, slice: SliceAccessor<T>) {
        slice(&mut *self.lock()).clear_error();
    }

    /// Forget everything cached for the signed-in user.
    pub fn reset_user_data(&self) {
        let mut state = self.lock();
        state.saved.reset();
        state.applications.reset();
    }

    pub(crate) fn update_auth(&self, change: impl FnOnce(&mut AuthState)) {
        change(&mut self.lock().auth);
    }
}
