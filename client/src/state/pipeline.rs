//! Request/result bookkeeping for one slice.
//!
//! Every operation is split into [`SlicePipeline::begin`], which hands out a
//! [`Ticket`], and [`SlicePipeline::settle`], which consumes it. Tickets are
//! numbered in the order they were started, which is what lets a slow,
//! superseded fetch be recognised and dropped when it finally resolves.
//!
//! Keyed changes confirmed while a fetch is in flight are replayed on top of
//! that fetch's result, so a listing requested before an insert was confirmed
//! cannot erase the insert. [`SlicePipeline::reset`] starts a new epoch;
//! tickets from an earlier epoch always settle [`Settlement::Stale`].

use tracing::{debug, warn};

use super::consumer::ConsumerId;
use super::slice::{CollectionSlice, Keyed, Mutation};
use crate::domain::SliceError;

/// How an operation intends to change its slice.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent<T: Keyed> {
    /// A fetch whose result overwrites the slice. Last started wins.
    Replace,
    /// A keyed change applied only once the remote side confirms it.
    Patch,
    /// A keyed change applied now and reverted if the remote side refuses.
    Optimistic(Mutation<T>),
}

/// Receipt for a started operation.
///
/// Must be handed back to [`SlicePipeline::settle`]; dropping it leaves the
/// slice loading until a later operation settles.
#[derive(Debug)]
#[must_use = "a ticket must be settled to release the slice"]
pub struct Ticket<T: Keyed> {
    seq: u64,
    epoch: u64,
    replace: bool,
    consumer: Option<ConsumerId>,
    applied: Option<Mutation<T>>,
    inverse: Option<Mutation<T>>,
}

impl<T: Keyed> Ticket<T> {
    /// Consumer that owns the result, if any.
    pub const fn consumer(&self) -> Option<ConsumerId> {
        self.consumer
    }
}

/// What [`SlicePipeline::settle`] did with a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The result was written to the slice.
    Applied,
    /// A newer fetch had already started, or the slice was reset after this
    /// operation began; the result was dropped.
    Stale,
    /// The owning consumer was torn down; the result was dropped.
    Abandoned,
    /// The operation failed and the slice now carries the error.
    Failed(SliceError),
}

/// A [`CollectionSlice`] plus its in-flight operation counters.
#[derive(Debug)]
pub struct SlicePipeline<T: Keyed> {
    slice: CollectionSlice<T>,
    next_seq: u64,
    epoch: u64,
    latest_started: Option<u64>,
    latest_replace: Option<u64>,
    replace_pending: bool,
    confirmed: Vec<(u64, Mutation<T>)>,
}

impl<T: Keyed> Default for SlicePipeline<T> {
    fn default() -> Self {
        Self {
            slice: CollectionSlice::default(),
            next_seq: 0,
            epoch: 0,
            latest_started: None,
            latest_replace: None,
            replace_pending: false,
            confirmed: Vec::new(),
        }
    }
}

impl<T: Keyed> SlicePipeline<T> {
    /// Current cached state.
    pub const fn slice(&self) -> &CollectionSlice<T> {
        &self.slice
    }

    /// Start an operation.
    ///
    /// Marks the slice as loading but leaves any previous error in place.
    /// Optimistic intents mutate the slice immediately.
    pub fn begin(&mut self, intent: Intent<T>, consumer: Option<ConsumerId>) -> Ticket<T> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.latest_started = Some(seq);
        self.slice.set_loading(true);

        let (replace, applied, inverse) = match intent {
            Intent::Replace => {
                self.latest_replace = Some(seq);
                self.replace_pending = true;
                (true, None, None)
            }
            Intent::Patch => (false, None, None),
            Intent::Optimistic(mutation) => {
                let inverse = self.slice.apply(mutation.clone());
                (false, Some(mutation), inverse)
            }
        };
        Ticket {
            seq,
            epoch: self.epoch,
            replace,
            consumer,
            applied,
            inverse,
        }
    }

    /// Settle `ticket` with the operation's outcome.
    ///
    /// `Ok(Some(mutation))` is applied, `Ok(None)` confirms without further
    /// change. `consumer_live` is `false` when the owner was torn down: the
    /// result is then dropped, but an optimistic change is still reverted on
    /// failure and the loading flag is still released.
    pub fn settle(
        &mut self,
        ticket: Ticket<T>,
        outcome: Result<Option<Mutation<T>>, SliceError>,
        consumer_live: bool,
    ) -> Settlement {
        let Ticket {
            seq,
            epoch,
            replace,
            applied,
            inverse,
            ..
        } = ticket;

        if epoch != self.epoch {
            debug!(seq, epoch, "dropping result begun before a reset");
            return Settlement::Stale;
        }
        let is_latest = self.latest_started == Some(seq);

        if replace && self.latest_replace.is_some_and(|latest| latest > seq) {
            debug!(seq, "dropping result of a superseded fetch");
            return Settlement::Stale;
        }
        let settles_latest_replace = replace && self.latest_replace == Some(seq);

        match outcome {
            Err(error) => {
                if settles_latest_replace {
                    self.close_replace();
                }
                if let Some(inverse) = inverse {
                    self.slice.apply(inverse);
                }
                if !consumer_live {
                    self.release(is_latest);
                    return Settlement::Abandoned;
                }
                warn!(seq, kind = %error.kind(), "slice operation failed");
                self.slice.set_error(Some(error.clone()));
                self.slice.set_loading(false);
                Settlement::Failed(error)
            }
            Ok(_) if !consumer_live => {
                if settles_latest_replace {
                    self.close_replace();
                }
                if let Some(mutation) = applied {
                    self.record_confirmed(mutation);
                }
                self.release(is_latest);
                Settlement::Abandoned
            }
            Ok(confirmed) if replace => {
                if let Some(mutation) = confirmed {
                    self.slice.apply(mutation);
                }
                self.replay_confirmed_since(seq);
                self.close_replace();
                self.slice.set_error(None);
                self.release(is_latest);
                Settlement::Applied
            }
            Ok(confirmed) => {
                if let Some(mutation) = applied {
                    self.record_confirmed(mutation);
                }
                if let Some(mutation) = confirmed {
                    self.record_confirmed(mutation.clone());
                    self.slice.apply(mutation);
                }
                self.slice.set_error(None);
                self.release(is_latest);
                Settlement::Applied
            }
        }
    }

    /// Drop the error, if any.
    pub fn clear_error(&mut self) {
        self.slice.set_error(None);
    }

    /// Empty the slice and start a new epoch.
    ///
    /// Every ticket handed out before the reset settles `Stale` without
    /// touching the slice.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.slice = CollectionSlice::default();
        self.latest_started = None;
        self.latest_replace = None;
        self.close_replace();
    }

    fn record_confirmed(&mut self, mutation: Mutation<T>) {
        if self.replace_pending {
            self.confirmed.push((self.next_seq, mutation));
        }
    }

    fn replay_confirmed_since(&mut self, seq: u64) {
        for (_, mutation) in std::mem::take(&mut self.confirmed)
            .into_iter()
            .filter(|(confirmed_at, _)| *confirmed_at > seq)
        {
            self.slice.apply(mutation);
        }
    }

    fn close_replace(&mut self) {
        self.replace_pending = false;
        self.confirmed.clear();
    }

    const fn release(&mut self, is_latest: bool) {
        if is_latest {
            self.slice.set_loading(false);
        }
    }
}
