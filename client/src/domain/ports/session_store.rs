//! Port for durable, role-scoped session storage.
//!
//! The store is the only mutable state shared across components. Each role
//! owns an independent slot; clearing one never touches the other. Writers
//! always replace a slot with a whole [`Session`] so readers never observe a
//! half-written value.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::{Role, Session};

use super::define_port_error;

define_port_error! {
    /// Errors raised by session store adapters.
    pub enum SessionStoreError {
        /// The backing medium could not be read or written.
        Io { message: String } => "session storage failed: {message}",
        /// A stored slot could not be decoded.
        Corrupt { key: String, message: String } =>
            "session slot {key} is corrupt: {message}",
    }
}

/// Durable key/value store with one session slot per role.
///
/// Access is synchronous: route guards read it in the same turn as a
/// navigation attempt.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// Read the session for `role`, if any.
    fn get(&self, role: Role) -> Result<Option<Session>, SessionStoreError>;

    /// Replace the slot for `role` with `session`.
    ///
    /// Implementations must reject a session whose own role differs from
    /// `role` rather than storing it under the wrong key.
    fn set(&self, role: Role, session: &Session) -> Result<(), SessionStoreError>;

    /// Remove the session for `role`. Clearing an empty slot succeeds.
    fn clear(&self, role: Role) -> Result<(), SessionStoreError>;

    /// Remove every role's session.
    fn clear_all(&self) -> Result<(), SessionStoreError> {
        Role::ALL.into_iter().try_for_each(|role| self.clear(role))
    }
}

/// Process-local store for tests and ephemeral front-ends.
///
/// Sessions do not survive a restart; use
/// [`FileSessionStore`](crate::outbound::FileSessionStore) for that.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    slots: Mutex<BTreeMap<Role, Session>>,
}

impl InMemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn ensure_slot_matches(role: Role, session: &Session) -> Result<(), SessionStoreError> {
    if session.role() != role {
        return Err(SessionStoreError::io(format!(
            "refusing to store a {} session in the {} slot",
            session.role(),
            role
        )));
    }
    Ok(())
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, role: Role) -> Result<Option<Session>, SessionStoreError> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(&role).cloned())
    }

    fn set(&self, role: Role, session: &Session) -> Result<(), SessionStoreError> {
        ensure_slot_matches(role, session)?;
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(role, session.clone());
        Ok(())
    }

    fn clear(&self, role: Role) -> Result<(), SessionStoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(&role);
        Ok(())
    }
}
