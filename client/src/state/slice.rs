//! Keyed collection cache and its reducer.
//!
//! A [`CollectionSlice`] only changes through [`CollectionSlice::apply`],
//! which returns the inverse of the mutation it performed. Optimistic
//! changes keep that inverse and replay it when the remote side refuses, so
//! a rejected mutation leaves `items` exactly as it was.

use std::fmt;

use crate::domain::{Application, ApplicationId, SavedMark, Scholarship, ScholarshipId, SliceError};

/// Entities stored in a slice are addressed by a stable key.
pub trait Keyed: Clone {
    /// Key type.
    type Key: Clone + Eq + fmt::Debug;

    /// Key of this entity.
    fn key(&self) -> &Self::Key;
}

impl Keyed for Scholarship {
    type Key = ScholarshipId;

    fn key(&self) -> &ScholarshipId {
        &self.id
    }
}

impl Keyed for SavedMark {
    type Key = ScholarshipId;

    fn key(&self) -> &ScholarshipId {
        &self.scholarship_id
    }
}

impl Keyed for Application {
    type Key = ApplicationId;

    fn key(&self) -> &ApplicationId {
        &self.id
    }
}

/// Where an upserted item lands when its key is new.
///
/// An item whose key is already present is replaced in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Prepend.
    Front,
    /// Append.
    Back,
    /// Insert at an index, clamped to the slice length.
    At(usize),
}

/// A single change to a slice's items.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T: Keyed> {
    /// Overwrite `items` wholesale.
    Replace(Vec<T>),
    /// Insert or replace by key.
    Upsert {
        /// Entity to store.
        item: T,
        /// Placement when the key is new.
        position: Position,
    },
    /// Remove by key. Removing an absent key is a no-op.
    Remove(T::Key),
}

impl<T: Keyed> Mutation<T> {
    /// Upsert appended at the back.
    pub const fn upsert(item: T) -> Self {
        Self::Upsert {
            item,
            position: Position::Back,
        }
    }

    /// Upsert prepended at the front.
    pub const fn prepend(item: T) -> Self {
        Self::Upsert {
            item,
            position: Position::Front,
        }
    }
}

/// Cached state for one resource collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSlice<T> {
    items: Vec<T>,
    loading: bool,
    error: Option<SliceError>,
}

impl<T> Default for CollectionSlice<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T: Keyed> CollectionSlice<T> {
    /// Cached items in display order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Whether the most recently started operation is still outstanding.
    pub const fn loading(&self) -> bool {
        self.loading
    }

    /// Error left by the last failed operation.
    pub const fn error(&self) -> Option<&SliceError> {
        self.error.as_ref()
    }

    /// Look an item up by key.
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }

    /// Whether an item with `key` is cached.
    pub fn contains(&self, key: &T::Key) -> bool {
        self.get(key).is_some()
    }

    fn index_of(&self, key: &T::Key) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }

    /// Apply `mutation` and return its inverse, or `None` when nothing
    /// changed.
    pub fn apply(&mut self, mutation: Mutation<T>) -> Option<Mutation<T>> {
        match mutation {
            Mutation::Replace(items) => {
                let previous = std::mem::replace(&mut self.items, items);
                Some(Mutation::Replace(previous))
            }
            Mutation::Upsert { item, position } => {
                let existing = self
                    .items
                    .iter_mut()
                    .enumerate()
                    .find(|(_, current)| current.key() == item.key());
                if let Some((index, slot)) = existing {
                    let previous = std::mem::replace(slot, item);
                    return Some(Mutation::Upsert {
                        item: previous,
                        position: Position::At(index),
                    });
                }
                let key = item.key().clone();
                let index = match position {
                    Position::Front => 0,
                    Position::Back => self.items.len(),
                    Position::At(index) => index.min(self.items.len()),
                };
                self.items.insert(index, item);
                Some(Mutation::Remove(key))
            }
            Mutation::Remove(key) => {
                let index = self.index_of(&key)?;
                let item = self.items.remove(index);
                Some(Mutation::Upsert {
                    item,
                    position: Position::At(index),
                })
            }
        }
    }

    pub(crate) const fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub(crate) fn set_error(&mut self, error: Option<SliceError>) {
        self.error = error;
    }
}
