//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **session_file**: durable, role-scoped session slots on disk (cap-std)
//! - **http_transport**: reqwest transport for the first-party backend
//! - **identity_toolkit**: reqwest adapter for the external identity provider
//!
//! Adapters are thin translators between domain types and wire formats. They
//! contain no business logic.

mod atomic_io;
pub mod http_transport;
pub mod identity_toolkit;
pub mod session_file;

pub use http_transport::ReqwestTransport;
pub use identity_toolkit::IdentityToolkitProvider;
pub use session_file::FileSessionStore;
