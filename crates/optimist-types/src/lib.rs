//! Foundation types for Optimist.
//!
//! Every other Optimist crate depends on `optimist-types`. It defines the
//! vocabulary shared by the snapshot store and the mutation engines.
//!
//! # Key Types
//!
//! - [`Status`] — the four-state mutation status (unsent, loading, success, error)
//! - [`Snapshot`] — `{ data, status, error }`, the unit observers read
//! - [`Entry`] — a per-key snapshot inside a stateful keyed container
//! - [`Rejection`] — what a caller-supplied handler fails with
//! - [`MutationError`] — what a mutation call rejects with
//! - [`Merge`] — shallow merge used by partial updates

pub mod error;
pub mod merge;
pub mod rejection;
pub mod snapshot;
pub mod status;

pub use error::{
    MutationError, MutationResult, ACTION_RETURNED_NULL, ERROR_CALLBACK_REJECTED,
    INDEX_NOT_FOUND, UNKNOWN_PRELOAD_OR_ACTION_REJECT,
};
pub use merge::Merge;
pub use rejection::{normalize_error, Rejection, REJECTED_WITHOUT_MESSAGE};
pub use snapshot::{Entry, Snapshot};
pub use status::Status;
