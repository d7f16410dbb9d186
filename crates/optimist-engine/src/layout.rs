//! Flat versus nested entries.
//!
//! A flat container stores plain values and only the container has a
//! status. A nested (stateful) container stores an [`Entry`] per key, each
//! with its own status and error.

use std::marker::PhantomData;

use optimist_types::Entry;

use crate::collection::Collection;
use crate::transitions::Mark;

/// How entries of a keyed container carry status.
pub trait Layout<C: Collection>: Send + Sync + 'static {
    /// The plain value handlers produce and callers receive.
    type Item: Clone + Send + Sync + 'static;

    /// `true` when each entry carries its own status.
    const NESTED: bool;

    /// Borrow the plain value out of a stored slot.
    fn item(slot: &C::Value) -> &Self::Item;

    /// Build a slot from a plain value with the given status.
    fn slot(item: Self::Item, mark: &Mark) -> C::Value;

    /// Same value, new status. Flat slots have no status and are cloned.
    fn remark(slot: &C::Value, mark: &Mark) -> C::Value;
}

/// Entries are plain values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flat;

impl<C: Collection> Layout<C> for Flat {
    type Item = C::Value;

    const NESTED: bool = false;

    fn item(slot: &C::Value) -> &C::Value {
        slot
    }

    fn slot(item: C::Value, _mark: &Mark) -> C::Value {
        item
    }

    fn remark(slot: &C::Value, _mark: &Mark) -> C::Value {
        slot.clone()
    }
}

/// Entries are `Entry<V>`, each with an independent status.
pub struct Nested<V>(PhantomData<fn() -> V>);

impl<C, V> Layout<C> for Nested<V>
where
    C: Collection<Value = Entry<V>>,
    V: Clone + Send + Sync + 'static,
{
    type Item = V;

    const NESTED: bool = true;

    fn item(slot: &Entry<V>) -> &V {
        &slot.data
    }

    fn slot(item: V, mark: &Mark) -> Entry<V> {
        Entry {
            data: item,
            status: mark.status,
            error: mark.error.clone(),
        }
    }

    fn remark(slot: &Entry<V>, mark: &Mark) -> Entry<V> {
        slot.with_status(mark.status, mark.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimist_types::Status;

    #[test]
    fn flat_ignores_marks() {
        let slot = <Flat as Layout<Vec<u8>>>::slot(4, &Mark::failed("x"));
        assert_eq!(slot, 4);
        assert!(!<Flat as Layout<Vec<u8>>>::NESTED);
    }

    #[test]
    fn nested_slot_carries_mark() {
        type L = Nested<u8>;
        let slot = <L as Layout<Vec<Entry<u8>>>>::slot(4, &Mark::loading());
        assert_eq!(slot.status, Status::Loading);
        let failed = <L as Layout<Vec<Entry<u8>>>>::remark(&slot, &Mark::failed("x"));
        assert_eq!(failed.data, 4);
        assert_eq!(failed.status, Status::Error);
        assert_eq!(failed.error.as_deref(), Some("x"));
        assert_eq!(*<L as Layout<Vec<Entry<u8>>>>::item(&failed), 4);
    }
}
