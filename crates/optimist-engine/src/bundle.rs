//! Handler bundles, one per operation kind.
//!
//! Each bundle names only the phases its operation understands, with the
//! value types that operation expects, so mixing up a create handler with a
//! delete handler is a type error rather than a runtime surprise.

use std::future::Future;

use optimist_types::Rejection;

use crate::handler::{Handler, IndexFn};

/// Replace the whole value of a scalar container (or a keyed container's
/// whole collection).
pub struct ReplaceHandlers<P, D> {
    pub(crate) preload: Option<Handler<P, D>>,
    pub(crate) action: Option<Handler<P, D>>,
    pub(crate) error: Option<Handler<P, Option<D>>>,
}

impl<P, D> Default for ReplaceHandlers<P, D> {
    fn default() -> Self {
        Self {
            preload: None,
            action: None,
            error: None,
        }
    }
}

impl<P: 'static, D: 'static> ReplaceHandlers<P, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Optimistic value committed with `loading` before the action runs.
    pub fn preload<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, Rejection>> + Send + 'static,
    {
        self.preload = Some(Handler::new(f));
        self
    }

    /// The real work; its value is committed with `success`.
    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, Rejection>> + Send + 'static,
    {
        self.action = Some(Handler::new(f));
        self
    }

    /// Recovery: `Some` replaces the data, `None` keeps it.
    pub fn error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<D>, Rejection>> + Send + 'static,
    {
        self.error = Some(Handler::new(f));
        self
    }
}

/// Insert one entry at the key resolved from the parameters.
pub struct CreateHandlers<P, K, V> {
    pub(crate) get_index: IndexFn<P, K>,
    pub(crate) preload: Option<Handler<P, V>>,
    pub(crate) action: Option<Handler<P, Option<V>>>,
    pub(crate) error: Option<Handler<P, Option<V>>>,
}

impl<P: 'static, K: 'static, V: 'static> CreateHandlers<P, K, V> {
    pub fn new<F>(get_index: F) -> Self
    where
        F: Fn(&P) -> K + Send + Sync + 'static,
    {
        Self {
            get_index: IndexFn::new(get_index),
            preload: None,
            action: None,
            error: None,
        }
    }

    /// Optimistic entry inserted with `loading` before the action runs.
    pub fn preload<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, Rejection>> + Send + 'static,
    {
        self.preload = Some(Handler::new(f));
        self
    }

    /// The created value. `None` rejects with `actionReturnedNull`.
    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<V>, Rejection>> + Send + 'static,
    {
        self.action = Some(Handler::new(f));
        self
    }

    /// Recovery: `Some` keeps an entry with this value in `error` state,
    /// `None` rolls the create back.
    pub fn error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<V>, Rejection>> + Send + 'static,
    {
        self.error = Some(Handler::new(f));
        self
    }

    pub(crate) fn index(&self, params: &P) -> K {
        self.get_index.resolve(params)
    }
}

/// Shallow-merge a patch into one existing entry.
pub struct UpdateHandlers<P, K, Patch, V> {
    pub(crate) get_index: IndexFn<P, K>,
    pub(crate) preload: Option<Handler<P, Patch>>,
    pub(crate) action: Option<Handler<P, Option<Patch>>>,
    pub(crate) error: Option<Handler<P, Option<V>>>,
}

impl<P: 'static, K: 'static, Patch: 'static, V: 'static> UpdateHandlers<P, K, Patch, V> {
    pub fn new<F>(get_index: F) -> Self
    where
        F: Fn(&P) -> K + Send + Sync + 'static,
    {
        Self {
            get_index: IndexFn::new(get_index),
            preload: None,
            action: None,
            error: None,
        }
    }

    /// Optimistic patch merged with `loading` before the action runs.
    pub fn preload<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Patch, Rejection>> + Send + 'static,
    {
        self.preload = Some(Handler::new(f));
        self
    }

    /// The confirmed patch. `None` rejects with `actionReturnedNull`.
    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Patch>, Rejection>> + Send + 'static,
    {
        self.action = Some(Handler::new(f));
        self
    }

    /// Recovery: `Some` replaces the entry's value outright.
    pub fn error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<V>, Rejection>> + Send + 'static,
    {
        self.error = Some(Handler::new(f));
        self
    }

    pub(crate) fn index(&self, params: &P) -> K {
        self.get_index.resolve(params)
    }
}

/// Remove one existing entry.
pub struct DeleteHandlers<P, K, V> {
    pub(crate) get_index: IndexFn<P, K>,
    pub(crate) preload: Option<Handler<P, Option<V>>>,
    pub(crate) action: Option<Handler<P, ()>>,
    pub(crate) error: Option<Handler<P, Option<V>>>,
}

impl<P: 'static, K: 'static, V: 'static> DeleteHandlers<P, K, V> {
    pub fn new<F>(get_index: F) -> Self
    where
        F: Fn(&P) -> K + Send + Sync + 'static,
    {
        Self {
            get_index: IndexFn::new(get_index),
            preload: None,
            action: None,
            error: None,
        }
    }

    /// Optimistic step: `None` removes the entry right away, `Some`
    /// replaces it with a placeholder in `loading` state.
    pub fn preload<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<V>, Rejection>> + Send + 'static,
    {
        self.preload = Some(Handler::new(f));
        self
    }

    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Rejection>> + Send + 'static,
    {
        self.action = Some(Handler::new(f));
        self
    }

    /// Recovery: `Some` restores the entry with this value, `None`
    /// restores the value it had before the call.
    pub fn error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<V>, Rejection>> + Send + 'static,
    {
        self.error = Some(Handler::new(f));
        self
    }

    pub(crate) fn index(&self, params: &P) -> K {
        self.get_index.resolve(params)
    }
}
