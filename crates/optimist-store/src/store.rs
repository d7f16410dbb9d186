use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::watch;
use tracing::trace;

/// Callback invoked with no arguments after each snapshot replacement.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Listener identity: the data pointer of the `Arc`, ignoring the vtable.
fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

struct StoreInner<S> {
    current: RwLock<Arc<S>>,
    listeners: RwLock<Vec<Listener>>,
    changes: watch::Sender<Arc<S>>,
}

impl<S> StoreInner<S> {
    fn remove_listener(&self, listener: &Listener) {
        let mut listeners = self.listeners.write().expect("listener lock poisoned");
        if let Some(pos) = listeners.iter().position(|l| same_listener(l, listener)) {
            listeners.remove(pos);
        }
    }
}

/// External-subscription snapshot container.
///
/// Cloning is cheap and yields a handle to the same snapshot.
pub struct SnapshotStore<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Clone for SnapshotStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for SnapshotStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl<S> SnapshotStore<S> {
    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.read().expect("listener lock poisoned").len()
    }
}

impl<S: Send + Sync + 'static> SnapshotStore<S> {
    /// Create a store holding `initial`.
    pub fn new(initial: S) -> Self {
        let current = Arc::new(initial);
        let (changes, _) = watch::channel(Arc::clone(&current));
        Self {
            inner: Arc::new(StoreInner {
                current: RwLock::new(current),
                listeners: RwLock::new(Vec::new()),
                changes,
            }),
        }
    }

    /// The current snapshot. Treat it as immutable.
    pub fn get_snapshot(&self) -> Arc<S> {
        self.inner
            .current
            .read()
            .expect("snapshot lock poisoned")
            .clone()
    }

    /// Register a listener.
    ///
    /// Registering the same `Arc` twice keeps a single registration. The
    /// returned [`Subscription`] removes it again; dropping the
    /// subscription without calling [`Subscription::unsubscribe`] leaves
    /// the listener registered.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        {
            let mut listeners = self.inner.listeners.write().expect("listener lock poisoned");
            if !listeners.iter().any(|l| same_listener(l, &listener)) {
                listeners.push(Arc::clone(&listener));
            }
        }
        let inner: Arc<dyn Unsubscribe> = self.inner.clone();
        Subscription {
            store: Arc::downgrade(&inner),
            listener,
            active: AtomicBool::new(true),
        }
    }

    /// Replace the snapshot and notify listeners.
    pub fn update(&self, next: S) {
        self.commit(Arc::new(next));
    }

    /// Replace the snapshot with one computed from the previous snapshot.
    ///
    /// `f` runs under the write lock and must not touch this store. Returns
    /// the committed snapshot.
    pub fn update_with<F>(&self, f: F) -> Arc<S>
    where
        F: FnOnce(&S) -> S,
    {
        let next = {
            let mut current = self.inner.current.write().expect("snapshot lock poisoned");
            let next = Arc::new(f(&**current));
            self.replace(&mut current, Arc::clone(&next));
            next
        };
        self.notify();
        next
    }

    /// Like [`Self::update_with`], but commits and notifies only when `f`
    /// returns `Ok`. On `Err` the snapshot is left as it was.
    pub fn try_update<F, E>(&self, f: F) -> Result<Arc<S>, E>
    where
        F: FnOnce(&S) -> Result<S, E>,
    {
        let next = {
            let mut current = self.inner.current.write().expect("snapshot lock poisoned");
            let next = Arc::new(f(&**current)?);
            self.replace(&mut current, Arc::clone(&next));
            next
        };
        self.notify();
        Ok(next)
    }

    /// Receiver that observes every committed snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<S>> {
        self.inner.changes.subscribe()
    }

    fn commit(&self, next: Arc<S>) {
        {
            let mut current = self.inner.current.write().expect("snapshot lock poisoned");
            self.replace(&mut current, next);
        }
        self.notify();
    }

    /// Swap in `next` and publish it to watchers. Called with the write
    /// lock held so watchers see commits in the same order as readers.
    fn replace(&self, current: &mut Arc<S>, next: Arc<S>) {
        *current = Arc::clone(&next);
        self.inner.changes.send_replace(next);
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .expect("listener lock poisoned")
            .clone();
        trace!(count = listeners.len(), "notifying listeners");
        for listener in listeners {
            listener();
        }
    }
}

/// Type-erased back-reference so [`Subscription`] needs no type parameter.
trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, listener: &Listener);
}

impl<S: Send + Sync> Unsubscribe for StoreInner<S> {
    fn unsubscribe(&self, listener: &Listener) {
        self.remove_listener(listener);
    }
}

/// Handle returned by [`SnapshotStore::subscribe`].
pub struct Subscription {
    store: Weak<dyn Unsubscribe>,
    listener: Listener,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(&self.listener);
        }
    }

    /// Returns `true` until [`Self::unsubscribe`] has been called.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
