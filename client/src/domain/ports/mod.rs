//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the core expects to talk to driven adapters: durable
//! session storage, the external identity provider, and the HTTP transport.
//! Each trait exposes a typed error so adapters map their failures into
//! predictable variants instead of returning opaque errors.

mod macros;

mod identity_provider;
mod session_store;
mod transport;

pub(crate) use macros::define_port_error;

pub(crate) use session_store::ensure_slot_matches;

#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{IdentityProvider, IdentityProviderError};
#[cfg(test)]
pub use session_store::MockSessionStore;
pub use session_store::{InMemorySessionStore, SessionStore, SessionStoreError};
#[cfg(test)]
pub use transport::MockTransport;
pub use transport::{Method, RemoteRequest, RemoteResponse, Transport, TransportError};
