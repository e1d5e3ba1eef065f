//! Navigation gate for role-protected views.
//!
//! The guard answers `Pending` until [`RouteGuard::resolve`] has run, so a
//! view never flashes a redirect before the first session check. After
//! that, every decision re-reads the session store, which means a session
//! cleared by a rejected call is noticed on the very next navigation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::Role;
use crate::domain::ports::SessionStore;
use crate::state::AuthStatus;

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The initial session check has not resolved; render a neutral state.
    Pending,
    /// The view may render.
    Allow,
    /// Redirect to the role's login surface.
    Deny {
        /// Login path to navigate to.
        redirect_to: &'static str,
        /// Destination recorded for after sign-in.
        return_to: String,
    },
}

/// Gate consulted before rendering a protected view.
pub struct RouteGuard {
    sessions: Arc<dyn SessionStore>,
    status: AuthStatus,
    return_to: BTreeMap<Role, String>,
}

impl RouteGuard {
    /// Guard in the `Unknown` state.
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions,
            status: AuthStatus::Unknown,
            return_to: BTreeMap::new(),
        }
    }

    /// Status as of the last [`Self::resolve`].
    pub const fn status(&self) -> AuthStatus {
        self.status
    }

    /// Complete the initial session check.
    pub fn resolve(&mut self) -> AuthStatus {
        let held = Role::ALL
            .into_iter()
            .any(|role| matches!(self.sessions.get(role), Ok(Some(_))));
        self.status = if held {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Unauthenticated
        };
        self.status
    }

    /// Decide whether `requested` may render for `required`.
    ///
    /// On denial the requested location is remembered for
    /// [`Self::take_return_to`].
    pub fn authorize(&mut self, required: Role, requested: &str) -> GuardDecision {
        if self.status == AuthStatus::Unknown {
            return GuardDecision::Pending;
        }
        if self.permits(required) {
            return GuardDecision::Allow;
        }
        debug!(role = %required, path = requested, "denying navigation");
        self.return_to.insert(required, requested.to_owned());
        GuardDecision::Deny {
            redirect_to: required.login_path(),
            return_to: requested.to_owned(),
        }
    }

    /// Where to send `role` after a successful sign-in: the last denied
    /// destination, once, or the role's default landing page.
    pub fn take_return_to(&mut self, role: Role) -> String {
        self.return_to
            .remove(&role)
            .unwrap_or_else(|| role.default_landing().to_owned())
    }

    fn permits(&self, role: Role) -> bool {
        let session = match self.sessions.get(role) {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(error) => {
                warn!(%role, %error, "session slot unreadable; denying");
                return false;
            }
        };
        match session.token().peek_claims() {
            Some(claims) if !claims.permits(role) => {
                warn!(%role, "session token claims do not match the required role");
                false
            }
            _ => true,
        }
    }
}
