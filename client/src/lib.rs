//! Client core for the scholarship portal.
//!
//! Binds federated identities to role-scoped backend sessions, performs
//! authenticated calls that enforce session expiry, and keeps client-side
//! state consistent while remote operations overlap.

pub mod config;
pub mod domain;
pub mod guard;
pub mod outbound;
pub mod state;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use config::ClientSettings;
pub use guard::{GuardDecision, RouteGuard};
pub use state::{AuthStatus, ClientStateStore, PortalActions};
