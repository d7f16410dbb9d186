//! Snapshot store primitive for Optimist.
//!
//! A [`SnapshotStore`] holds one immutable snapshot behind an `Arc`. Readers
//! get the current `Arc` by reference; writers replace it wholesale. After
//! every replacement all registered listeners are invoked synchronously.
//!
//! # Design Rules
//!
//! 1. A snapshot is never mutated in place; observers may compare `Arc`
//!    pointers to detect change.
//! 2. Listeners are deduplicated by `Arc` identity.
//! 3. Notification iterates a copy of the listener set taken after the
//!    write lock is released, so listeners may read the store or
//!    (un)subscribe from inside the callback.

pub mod store;

pub use store::{Listener, SnapshotStore, Subscription};
