//! The snapshot shape shared by containers and stateful entries.

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Immutable view of a container (or of one entry in a stateful container).
///
/// Snapshots are replaced, never edited: every transition builds a new
/// value and the store swaps it in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<D> {
    pub data: D,
    pub status: Status,
    /// Display message of the last failure, cleared on the next transition.
    pub error: Option<String>,
}

/// A single entry of a stateful keyed container. Its status is independent
/// of the container's own status.
pub type Entry<V> = Snapshot<V>;

impl<D> Snapshot<D> {
    /// A fresh snapshot in the `Unsent` state.
    pub fn new(data: D) -> Self {
        Self {
            data,
            status: Status::Unsent,
            error: None,
        }
    }

    pub fn loading(data: D) -> Self {
        Self {
            data,
            status: Status::Loading,
            error: None,
        }
    }

    pub fn success(data: D) -> Self {
        Self {
            data,
            status: Status::Success,
            error: None,
        }
    }

    pub fn failed(data: D, message: impl Into<String>) -> Self {
        Self {
            data,
            status: Status::Error,
            error: Some(message.into()),
        }
    }

    /// Same data, new status and error.
    pub fn with_status(&self, status: Status, error: Option<String>) -> Self
    where
        D: Clone,
    {
        Self {
            data: self.data.clone(),
            status,
            error,
        }
    }
}

impl<D: Default> Default for Snapshot<D> {
    fn default() -> Self {
        Self::new(D::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_is_unsent() {
        let snap = Snapshot::new(5);
        assert_eq!(snap.status, Status::Unsent);
        assert!(snap.error.is_none());
    }

    #[test]
    fn with_status_leaves_original_alone() {
        let snap = Snapshot::success(vec![1, 2]);
        let failed = snap.with_status(Status::Error, Some("boom".into()));
        assert_eq!(snap.status, Status::Success);
        assert_eq!(failed.data, vec![1, 2]);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn entry_serializes_with_lowercase_status() {
        let entry: Entry<u32> = Snapshot::failed(7, "nope");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "nope");
        assert_eq!(json["data"], 7);
    }
}
