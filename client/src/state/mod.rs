//! Client-side state kept consistent under concurrent remote operations.
//!
//! - `slice`: keyed collection cache and its reducer.
//! - `pipeline`: start-ordered tickets, stale-result discard, optimistic
//!   rollback.
//! - `consumer`: scopes whose teardown cancels result delivery.
//! - `store`: the shared [`ClientStateStore`] and authentication slice.
//! - `actions`: the portal operations built on top.

mod actions;
mod consumer;
mod pipeline;
mod slice;
mod store;

pub use actions::PortalActions;
pub use consumer::{ConsumerId, ConsumerRegistry};
pub use pipeline::{Intent, Settlement, SlicePipeline, Ticket};
pub use slice::{CollectionSlice, Keyed, Mutation, Position};
pub use store::{AuthState, AuthStatus, ClientStateStore, PortalState, SliceAccessor};
