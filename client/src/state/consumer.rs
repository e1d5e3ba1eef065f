//! Consumer scopes: the owners of in-flight results.
//!
//! A view registers when it mounts and tears down when it unmounts. Results
//! for operations started by a torn-down consumer are not written to shared
//! state.

use std::collections::BTreeSet;
use std::fmt;

/// Handle for one registered consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerId(u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Tracks which consumers are still mounted.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    next: u64,
    live: BTreeSet<ConsumerId>,
}

impl ConsumerRegistry {
    /// Register a new consumer.
    pub fn register(&mut self) -> ConsumerId {
        let id = ConsumerId(self.next);
        self.next += 1;
        self.live.insert(id);
        id
    }

    /// Tear `consumer` down. Tearing down twice is harmless.
    pub fn teardown(&mut self, consumer: ConsumerId) {
        self.live.remove(&consumer);
    }

    /// Whether results owned by `consumer` may still be applied.
    ///
    /// Operations with no owner are always live.
    pub fn is_live(&self, consumer: Option<ConsumerId>) -> bool {
        consumer.is_none_or(|id| self.live.contains(&id))
    }
}
