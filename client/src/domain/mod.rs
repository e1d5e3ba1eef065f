//! Domain primitives, ports, and the services built on them.
//!
//! Purpose: Define strongly typed values shared by every client surface and
//! the two services that talk to the outside world. Adapters live under
//! `outbound`; client-side state lives under `state`.
//!
//! Public surface:
//! - `IdentityReconciler` binds a provider identity to a role-scoped
//!   backend session.
//! - `RemoteResourceClient` performs authenticated calls and enforces
//!   session expiry.
//! - `ApplicationLifecycle` validates observed application status changes.
//! - `SliceError` / `ErrorKind` carry failures into client state.

pub mod application;
pub mod auth;
pub mod endpoint;
pub mod error;
pub mod identity_reconciler;
pub mod ports;
pub mod profile;
pub mod resource_client;
pub mod role;
pub mod scholarship;
pub mod session;

pub use self::application::{
    Application, ApplicationId, ApplicationLifecycle, ApplicationStatus, Observation,
    ScholarshipSummary,
};
pub use self::auth::{
    AuthValidationError, Credentials, Email, ExternalIdentity, FULL_NAME_MIN, PASSWORD_MIN,
    SignUpProfile,
};
pub use self::endpoint::Endpoint;
pub use self::error::{ErrorKind, Presentation, SliceError};
pub use self::identity_reconciler::{AuthError, IdentityReconciler};
pub use self::profile::{Caste, DemographicProfile};
pub use self::resource_client::{HttpError, RemoteResourceClient};
pub use self::role::{CallScope, Role};
pub use self::scholarship::{
    Category, Eligibility, NewScholarship, SavedMark, Scholarship, ScholarshipDraft,
    ScholarshipFilter, ScholarshipId, ScholarshipValidationError, SortField, SortOrder,
};
pub use self::session::{BlankToken, Session, SessionToken, TokenClaims};
