//! Keyed data shapes.
//!
//! A keyed container holds either an ordered sequence addressed by position
//! or a mapping addressed by key. The shape is fixed by the container's
//! collection type, so transitions never re-detect it at runtime.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use crate::error::{TransitionError, TransitionResult};

/// Which addressing model a collection uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Positional; inserts shift later entries right, removals shift left.
    Sequence,
    /// Unique keys; order is irrelevant for reads.
    Mapping,
}

/// A collection of slots addressable by key.
///
/// The mutating methods are only ever called on a fresh clone inside a
/// transition builder; snapshots themselves stay untouched.
pub trait Collection: Clone + Send + Sync + 'static {
    type Key: Clone + Ord + fmt::Debug + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;

    const SHAPE: Shape;

    fn get(&self, key: &Self::Key) -> Option<&Self::Value>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, key: &Self::Key) -> bool {
        self.get(key).is_some()
    }

    /// Whether [`Self::insert_slot`] would accept this key.
    fn can_insert(&self, key: &Self::Key) -> bool;

    /// Sequence: splice `value` in at `key`, which may equal `len()`.
    /// Mapping: set `key` to `value`.
    fn insert_slot(&mut self, key: Self::Key, value: Self::Value) -> TransitionResult<()>;

    /// Overwrite an existing slot.
    fn set_slot(&mut self, key: &Self::Key, value: Self::Value) -> TransitionResult<()>;

    /// Remove an existing slot and return its value.
    fn remove_slot(&mut self, key: &Self::Key) -> TransitionResult<Self::Value>;
}

fn not_found<K: fmt::Debug>(key: &K) -> TransitionError {
    TransitionError::KeyNotFound(format!("{key:?}"))
}

impl<T> Collection for Vec<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Key = usize;
    type Value = T;

    const SHAPE: Shape = Shape::Sequence;

    fn get(&self, key: &usize) -> Option<&T> {
        self.as_slice().get(*key)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn can_insert(&self, key: &usize) -> bool {
        *key <= Vec::len(self)
    }

    fn insert_slot(&mut self, key: usize, value: T) -> TransitionResult<()> {
        if key > Vec::len(self) {
            return Err(TransitionError::OutOfBounds {
                index: key,
                len: Vec::len(self),
            });
        }
        self.insert(key, value);
        Ok(())
    }

    fn set_slot(&mut self, key: &usize, value: T) -> TransitionResult<()> {
        let slot = self.get_mut(*key).ok_or_else(|| not_found(key))?;
        *slot = value;
        Ok(())
    }

    fn remove_slot(&mut self, key: &usize) -> TransitionResult<T> {
        if *key >= Vec::len(self) {
            return Err(not_found(key));
        }
        Ok(self.remove(*key))
    }
}

impl<K, T> Collection for BTreeMap<K, T>
where
    K: Clone + Ord + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Key = K;
    type Value = T;

    const SHAPE: Shape = Shape::Mapping;

    fn get(&self, key: &K) -> Option<&T> {
        BTreeMap::get(self, key)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn can_insert(&self, _key: &K) -> bool {
        true
    }

    fn insert_slot(&mut self, key: K, value: T) -> TransitionResult<()> {
        self.insert(key, value);
        Ok(())
    }

    fn set_slot(&mut self, key: &K, value: T) -> TransitionResult<()> {
        let slot = self.get_mut(key).ok_or_else(|| not_found(key))?;
        *slot = value;
        Ok(())
    }

    fn remove_slot(&mut self, key: &K) -> TransitionResult<T> {
        self.remove(key).ok_or_else(|| not_found(key))
    }
}

impl<K, T> Collection for HashMap<K, T>
where
    K: Clone + Ord + Hash + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Key = K;
    type Value = T;

    const SHAPE: Shape = Shape::Mapping;

    fn get(&self, key: &K) -> Option<&T> {
        HashMap::get(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn can_insert(&self, _key: &K) -> bool {
        true
    }

    fn insert_slot(&mut self, key: K, value: T) -> TransitionResult<()> {
        self.insert(key, value);
        Ok(())
    }

    fn set_slot(&mut self, key: &K, value: T) -> TransitionResult<()> {
        let slot = self.get_mut(key).ok_or_else(|| not_found(key))?;
        *slot = value;
        Ok(())
    }

    fn remove_slot(&mut self, key: &K) -> TransitionResult<T> {
        self.remove(key).ok_or_else(|| not_found(key))
    }
}
