//! Snapshot transition builders.
//!
//! Pure functions from an old snapshot to a new one. Each builder clones the
//! collection, applies one slot change through [`Collection`], and stamps
//! the container status when a root [`Mark`] is given. The input snapshot is
//! never modified, so observers can rely on pointer inequality.

use optimist_types::{Snapshot, Status};

use crate::collection::Collection;
use crate::error::{TransitionError, TransitionResult};

/// A status together with the error message that goes with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mark {
    pub status: Status,
    pub error: Option<String>,
}

impl Mark {
    pub fn loading() -> Self {
        Self {
            status: Status::Loading,
            error: None,
        }
    }

    pub fn success() -> Self {
        Self {
            status: Status::Success,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            error: Some(message.into()),
        }
    }
}

fn rebuild<D>(prev: &Snapshot<D>, data: D, root: Option<&Mark>) -> Snapshot<D> {
    match root {
        Some(mark) => Snapshot {
            data,
            status: mark.status,
            error: mark.error.clone(),
        },
        None => Snapshot {
            data,
            status: prev.status,
            error: prev.error.clone(),
        },
    }
}

/// Same data, new container status.
pub fn mark_root<D: Clone>(prev: &Snapshot<D>, mark: &Mark) -> Snapshot<D> {
    prev.with_status(mark.status, mark.error.clone())
}

/// Same data, container status stamped only when `root` is given.
pub fn with_root<D: Clone>(prev: &Snapshot<D>, root: Option<&Mark>) -> Snapshot<D> {
    rebuild(prev, prev.data.clone(), root)
}

/// Whole-value replacement used by the scalar engine.
pub fn set_data<D>(data: D, mark: &Mark) -> Snapshot<D> {
    Snapshot {
        data,
        status: mark.status,
        error: mark.error.clone(),
    }
}

/// Insert a slot: splice for sequences, set for mappings.
pub fn insert_slot<C: Collection>(
    prev: &Snapshot<C>,
    key: C::Key,
    value: C::Value,
    root: Option<&Mark>,
) -> TransitionResult<Snapshot<C>> {
    let mut data = prev.data.clone();
    data.insert_slot(key, value)?;
    Ok(rebuild(prev, data, root))
}

/// Overwrite an existing slot.
pub fn replace_slot<C: Collection>(
    prev: &Snapshot<C>,
    key: &C::Key,
    value: C::Value,
    root: Option<&Mark>,
) -> TransitionResult<Snapshot<C>> {
    let mut data = prev.data.clone();
    data.set_slot(key, value)?;
    Ok(rebuild(prev, data, root))
}

/// Overwrite an existing slot with a value computed from its current one.
pub fn modify_slot<C, F>(
    prev: &Snapshot<C>,
    key: &C::Key,
    f: F,
    root: Option<&Mark>,
) -> TransitionResult<Snapshot<C>>
where
    C: Collection,
    F: FnOnce(&C::Value) -> C::Value,
{
    let mut data = prev.data.clone();
    let next = match prev.data.get(key) {
        Some(current) => f(current),
        None => return Err(TransitionError::KeyNotFound(format!("{key:?}"))),
    };
    data.set_slot(key, next)?;
    Ok(rebuild(prev, data, root))
}

/// Remove an existing slot, returning the new snapshot and the removed value.
pub fn remove_slot<C: Collection>(
    prev: &Snapshot<C>,
    key: &C::Key,
    root: Option<&Mark>,
) -> TransitionResult<(Snapshot<C>, C::Value)> {
    let mut data = prev.data.clone();
    let removed = data.remove_slot(key)?;
    Ok((rebuild(prev, data, root), removed))
}

/// Put a slot back after a failed delete. A slot the delete already took
/// out is inserted again (shifting sequence neighbours back into place);
/// otherwise the slot is overwritten.
pub fn restore_slot<C: Collection>(
    prev: &Snapshot<C>,
    key: &C::Key,
    value: C::Value,
    removed: bool,
    root: Option<&Mark>,
) -> TransitionResult<Snapshot<C>> {
    if removed {
        insert_slot(prev, key.clone(), value, root)
    } else {
        replace_slot(prev, key, value, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    fn map_snapshot() -> Snapshot<BTreeMap<String, u32>> {
        Snapshot::success(BTreeMap::from([("0".to_string(), 0)]))
    }

    #[test]
    fn insert_keeps_previous_snapshot() {
        let prev = map_snapshot();
        let next = insert_slot(&prev, "1".into(), 1, Some(&Mark::loading())).unwrap();
        assert_eq!(prev.data.len(), 1);
        assert_eq!(prev.status, Status::Success);
        assert_eq!(next.data.len(), 2);
        assert_eq!(next.status, Status::Loading);
    }

    #[test]
    fn no_root_mark_keeps_container_status() {
        let prev = Snapshot::failed(vec![1u8], "old");
        let next = replace_slot(&prev, &0, 9, None).unwrap();
        assert_eq!(next.data, vec![9]);
        assert_eq!(next.status, Status::Error);
        assert_eq!(next.error.as_deref(), Some("old"));
    }

    #[test]
    fn insert_at_head_and_tail() {
        let prev = Snapshot::new(vec!["0"]);
        let head = insert_slot(&prev, 0, "new", None).unwrap();
        assert_eq!(head.data, vec!["new", "0"]);
        let tail = insert_slot(&prev, 1, "new", None).unwrap();
        assert_eq!(tail.data, vec!["0", "new"]);
    }

    #[test]
    fn modify_missing_key_fails() {
        let prev = map_snapshot();
        let err = modify_slot(&prev, &"9".to_string(), |v| v + 1, None).unwrap_err();
        assert!(matches!(err, TransitionError::KeyNotFound(_)));
        let next = modify_slot(&prev, &"0".to_string(), |v| v + 1, None).unwrap();
        assert_eq!(next.data["0"], 1);
    }

    #[test]
    fn remove_returns_value() {
        let prev = map_snapshot();
        let (next, removed) =
            remove_slot(&prev, &"0".to_string(), Some(&Mark::success())).unwrap();
        assert_eq!(removed, 0);
        assert!(next.data.is_empty());
        assert_eq!(prev.data.len(), 1);
    }

    #[test]
    fn restore_inserts_or_replaces() {
        // [1, 2, 3] after removing index 1.
        let prev = Snapshot::new(vec![1, 3]);
        let reinserted = restore_slot(&prev, &1, 2, true, None).unwrap();
        assert_eq!(reinserted.data, vec![1, 2, 3]);
        let replaced = restore_slot(&prev, &1, 2, false, None).unwrap();
        assert_eq!(replaced.data, vec![1, 2]);
    }

    #[test]
    fn root_marks() {
        let prev = Snapshot::new(5);
        let marked = mark_root(&prev, &Mark::failed("bad"));
        assert_eq!(marked.status, Status::Error);
        assert_eq!(with_root(&marked, None), marked);
        assert_eq!(set_data(6, &Mark::success()), Snapshot::success(6));
    }

    proptest! {
        #[test]
        fn sequence_insert_then_remove_restores(
            items in proptest::collection::vec(any::<u16>(), 0..32),
            value in any::<u16>(),
            pick in any::<usize>(),
        ) {
            let index = pick % (items.len() + 1);
            let prev = Snapshot::new(items.clone());
            let next = insert_slot(&prev, index, value, None).unwrap();
            prop_assert_eq!(next.data.len(), items.len() + 1);
            prop_assert_eq!(next.data[index], value);
            let (back, removed) = remove_slot(&next, &index, None).unwrap();
            prop_assert_eq!(removed, value);
            prop_assert_eq!(back.data, items);
        }

        #[test]
        fn sequence_insert_past_end_fails(
            items in proptest::collection::vec(any::<u8>(), 0..16),
            extra in 1usize..8,
        ) {
            let prev = Snapshot::new(items.clone());
            let index = items.len() + extra;
            prop_assert!(insert_slot(&prev, index, 0, None).is_err());
            prop_assert_eq!(prev.data, items);
        }
    }
}
