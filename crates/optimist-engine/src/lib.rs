//! Optimistic/pessimistic mutation engine for Optimist.
//!
//! A container owns a [`SnapshotStore`] and hands out mutation handles.
//! Each handle runs caller-supplied async phases in order. The preload
//! commits an optimistic value with `loading` before any remote work
//! starts. The action does the real work and commits with `success`. If
//! either fails, the error phase decides what the snapshot keeps.
//!
//! Scalar containers hold one value. Keyed containers hold a sequence or a
//! mapping, either flat (only the container has a status) or stateful
//! (every entry carries its own status).
//!
//! # Quick Start
//!
//! ```rust
//! use optimist_engine::{CreateHandlers, KeyedContainer, KeyedList, Rejection, Status};
//!
//! #[tokio::main]
//! async fn main() {
//!     let todos: KeyedList<String> = KeyedContainer::new(vec!["write docs".to_string()]);
//!     let append = todos.make_create(
//!         CreateHandlers::new(|_: &String| 1usize)
//!             .preload(|title: String| async move { Ok::<_, Rejection>(title) })
//!             .action(|title: String| async move { Ok::<_, Rejection>(Some(title)) }),
//!     );
//!
//!     append.call("ship it".to_string()).await.unwrap();
//!     assert_eq!(todos.len(), 2);
//!     assert_eq!(todos.status(), Status::Success);
//! }
//! ```

pub mod bundle;
pub mod collection;
pub mod config;
pub mod error;
pub mod handler;
pub mod keyed;
pub mod layout;
mod locks;
pub mod scalar;
pub mod transitions;

// Re-exports for convenience.
pub use bundle::{CreateHandlers, DeleteHandlers, ReplaceHandlers, UpdateHandlers};
pub use collection::{Collection, Shape};
pub use config::ContainerConfig;
pub use error::{ConfigError, TransitionError, TransitionResult};
pub use handler::{BoxFuture, Handler, IndexFn};
pub use keyed::{
    CreateMutation, DeleteMutation, KeyedContainer, KeyedList, KeyedMap, StatefulList,
    StatefulMap, UpdateMutation,
};
pub use layout::{Flat, Layout, Nested};
pub use scalar::{ReplaceMutation, ScalarContainer};
pub use transitions::Mark;

pub use optimist_store::{Listener, SnapshotStore, Subscription};
pub use optimist_types::{
    normalize_error, Entry, Merge, MutationError, MutationResult, Rejection, Snapshot, Status,
};
