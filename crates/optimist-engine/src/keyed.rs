//! Keyed mutation engine.
//!
//! A [`KeyedContainer`] holds a collection of entries addressed by key or
//! position. Create, update, and delete each run preload → action → error
//! against a single key; replace reuses the scalar engine on the whole
//! collection.
//!
//! The key is resolved once, before the preload. Every later phase goes
//! back to the store for the latest snapshot, so a mutation never clobbers
//! changes other operations committed while it was awaiting.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use optimist_store::{Listener, SnapshotStore, Subscription};
use optimist_types::{
    Entry, Merge, MutationError, MutationResult, Snapshot, Status, ERROR_CALLBACK_REJECTED,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::bundle::{CreateHandlers, DeleteHandlers, ReplaceHandlers, UpdateHandlers};
use crate::collection::{Collection, Shape};
use crate::config::ContainerConfig;
use crate::error::TransitionResult;
use crate::handler::{recover, Failure, Recovery};
use crate::layout::{Flat, Layout, Nested};
use crate::locks::KeyLocks;
use crate::scalar::ReplaceMutation;
use crate::transitions::{
    insert_slot, mark_root, modify_slot, remove_slot, replace_slot, restore_slot, Mark,
};

/// Flat list addressed by position.
pub type KeyedList<V> = KeyedContainer<Vec<V>, Flat>;
/// Flat map addressed by key.
pub type KeyedMap<K, V> = KeyedContainer<BTreeMap<K, V>, Flat>;
/// List whose entries each carry their own status.
pub type StatefulList<V> = KeyedContainer<Vec<Entry<V>>, Nested<V>>;
/// Map whose entries each carry their own status.
pub type StatefulMap<K, V> = KeyedContainer<BTreeMap<K, Entry<V>>, Nested<V>>;

/// State shared by a container and every mutation built from it.
struct Shared<C: Collection> {
    store: SnapshotStore<Snapshot<C>>,
    config: Arc<ContainerConfig>,
    locks: KeyLocks<C::Key>,
}

impl<C: Collection> Shared<C> {
    fn label(&self) -> &str {
        &self.config.label
    }

    /// Apply a fallible transition to the latest snapshot. A key that no
    /// longer resolves surfaces as `indexNotFound`.
    fn commit<F>(&self, f: F) -> MutationResult<Arc<Snapshot<C>>>
    where
        F: FnOnce(&Snapshot<C>) -> TransitionResult<Snapshot<C>>,
    {
        self.store.try_update(f).map_err(MutationError::from)
    }

    fn commit_removal(&self, key: &C::Key, root: Option<&Mark>) -> MutationResult<Arc<Snapshot<C>>> {
        self.commit(|prev| remove_slot(prev, key, root).map(|(next, _)| next))
    }

    fn mark(&self, mark: &Mark) {
        self.store.update_with(|prev| mark_root(prev, mark));
    }

    /// The root mark for a single-entry transition. Flat containers always
    /// carry the status on the root; stateful ones only when configured.
    fn root<'m, L: Layout<C>>(&self, mark: &'m Mark) -> Option<&'m Mark> {
        (!L::NESTED || self.config.update_root_status).then_some(mark)
    }

    fn item<L: Layout<C>>(snapshot: &Snapshot<C>, key: &C::Key) -> Option<L::Item> {
        snapshot.data.get(key).map(|slot| L::item(slot).clone())
    }
}

/// A container of keyed entries.
pub struct KeyedContainer<C: Collection, L = Flat> {
    shared: Arc<Shared<C>>,
    _layout: PhantomData<fn() -> L>,
}

impl<C: Collection, L> Clone for KeyedContainer<C, L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _layout: PhantomData,
        }
    }
}

impl<C: Collection, L: Layout<C>> KeyedContainer<C, L> {
    pub fn new(data: C) -> Self {
        Self::with_config(data, ContainerConfig::default())
    }

    pub fn with_config(data: C, config: ContainerConfig) -> Self {
        Self::from_snapshot(Snapshot::new(data), config)
    }

    pub fn from_snapshot(snapshot: Snapshot<C>, config: ContainerConfig) -> Self {
        debug!(
            container = %config.label,
            shape = ?C::SHAPE,
            nested = L::NESTED,
            "keyed container created"
        );
        Self {
            shared: Arc::new(Shared {
                store: SnapshotStore::new(snapshot),
                config: Arc::new(config),
                locks: KeyLocks::new(),
            }),
            _layout: PhantomData,
        }
    }

    pub fn store(&self) -> &SnapshotStore<Snapshot<C>> {
        &self.shared.store
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.shared.config
    }

    pub fn get_snapshot(&self) -> Arc<Snapshot<C>> {
        self.shared.store.get_snapshot()
    }

    /// The container's own status.
    pub fn status(&self) -> Status {
        self.get_snapshot().status
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.shared.store.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot<C>>> {
        self.shared.store.watch()
    }

    /// Plain value at `key`.
    pub fn get(&self, key: &C::Key) -> Option<L::Item> {
        Shared::<C>::item::<L>(&self.get_snapshot(), key)
    }

    /// Stored slot at `key`; for stateful containers this includes the
    /// entry's status and error.
    pub fn entry(&self, key: &C::Key) -> Option<C::Value> {
        self.get_snapshot().data.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.get_snapshot().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.get_snapshot().data.is_empty()
    }

    /// Replace the whole collection.
    pub fn make_replace<P>(&self, handlers: ReplaceHandlers<P, C>) -> ReplaceMutation<P, C>
    where
        P: Clone + Send + 'static,
    {
        ReplaceMutation::new(
            self.shared.store.clone(),
            Arc::clone(&self.shared.config),
            handlers,
        )
    }

    pub fn make_create<P>(
        &self,
        handlers: CreateHandlers<P, C::Key, L::Item>,
    ) -> CreateMutation<C, L, P>
    where
        P: Clone + Send + 'static,
    {
        CreateMutation {
            shared: Arc::clone(&self.shared),
            handlers: Arc::new(handlers),
            _layout: PhantomData,
        }
    }

    pub fn make_update<P, Patch>(
        &self,
        handlers: UpdateHandlers<P, C::Key, Patch, L::Item>,
    ) -> UpdateMutation<C, L, P, Patch>
    where
        P: Clone + Send + 'static,
        Patch: Send + 'static,
        L::Item: Merge<Patch>,
    {
        UpdateMutation {
            shared: Arc::clone(&self.shared),
            handlers: Arc::new(handlers),
            _layout: PhantomData,
        }
    }

    pub fn make_delete<P>(
        &self,
        handlers: DeleteHandlers<P, C::Key, L::Item>,
    ) -> DeleteMutation<C, L, P>
    where
        P: Clone + Send + 'static,
    {
        DeleteMutation {
            shared: Arc::clone(&self.shared),
            handlers: Arc::new(handlers),
            _layout: PhantomData,
        }
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Insert one entry. Resolves with the created value.
pub struct CreateMutation<C: Collection, L: Layout<C>, P> {
    shared: Arc<Shared<C>>,
    handlers: Arc<CreateHandlers<P, C::Key, L::Item>>,
    _layout: PhantomData<fn() -> L>,
}

impl<C: Collection, L: Layout<C>, P> Clone for CreateMutation<C, L, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            handlers: Arc::clone(&self.handlers),
            _layout: PhantomData,
        }
    }
}

impl<C, L, P> CreateMutation<C, L, P>
where
    C: Collection,
    L: Layout<C>,
    P: Clone + Send + 'static,
{
    pub async fn call(&self, params: P) -> MutationResult<L::Item> {
        let shared = &self.shared;
        let key = self.handlers.index(&params);
        let _guard = shared
            .locks
            .acquire(&key, shared.config.serialize_per_key)
            .await;

        // A mapping preload overwrites whatever sits at the key; keep it so a
        // rollback can put it back. Sequence inserts never displace.
        let displaced = {
            let snapshot = shared.store.get_snapshot();
            if !snapshot.data.can_insert(&key) {
                debug!(container = shared.label(), key = ?key, "create target out of range");
                return Err(MutationError::IndexNotFound);
            }
            match C::SHAPE {
                Shape::Mapping => snapshot.data.get(&key).cloned(),
                Shape::Sequence => None,
            }
        };

        let mut inserted = false;
        let failure = match self.phases(&key, params.clone(), &mut inserted).await {
            Ok(item) => return Ok(item),
            Err(Failure::Aborted(err)) => {
                warn!(container = shared.label(), key = ?key, error = %err, "create aborted");
                return Err(err);
            }
            Err(failure) => failure,
        };
        let message = failure.message();
        warn!(container = shared.label(), key = ?key, error = %message, "create failed");

        let failed = Mark::failed(message);
        match recover(self.handlers.error.as_ref(), params).await {
            Recovery::Replace(item) => {
                let slot = L::slot(item, &failed);
                let root = shared.root::<L>(&failed);
                if inserted {
                    shared.commit(|prev| replace_slot(prev, &key, slot, root))?;
                } else {
                    shared.commit(|prev| insert_slot(prev, key.clone(), slot, root))?;
                }
            }
            Recovery::Keep if inserted => self.roll_back(&key, displaced, &failed)?,
            Recovery::Keep => shared.mark(&failed),
            Recovery::Failed(rejection) => {
                warn!(container = shared.label(), key = ?key, error = %rejection, "error handler rejected");
                let rejected = Mark::failed(ERROR_CALLBACK_REJECTED);
                if inserted {
                    self.roll_back(&key, displaced, &rejected)?;
                } else {
                    shared.mark(&rejected);
                }
                return Err(MutationError::ErrorCallbackRejected);
            }
        }
        Err(failure.into_error())
    }

    /// Undo the preload insert: restore the displaced entry, or drop the key.
    /// The root carries the error since the created entry is gone.
    fn roll_back(
        &self,
        key: &C::Key,
        displaced: Option<C::Value>,
        mark: &Mark,
    ) -> MutationResult<()> {
        match displaced {
            Some(slot) => self
                .shared
                .commit(|prev| replace_slot(prev, key, slot, Some(mark)))?,
            None => self.shared.commit_removal(key, Some(mark))?,
        };
        Ok(())
    }

    async fn phases(
        &self,
        key: &C::Key,
        params: P,
        inserted: &mut bool,
    ) -> Result<L::Item, Failure> {
        let shared = &self.shared;
        let loading = Mark::loading();

        let mut preloaded = None;
        if let Some(preload) = &self.handlers.preload {
            let item = preload
                .call(params.clone())
                .await
                .map_err(Failure::Rejected)?;
            let slot = L::slot(item.clone(), &loading);
            shared.commit(|prev| insert_slot(prev, key.clone(), slot, shared.root::<L>(&loading)))?;
            *inserted = true;
            preloaded = Some(item);
            debug!(container = shared.label(), key = ?key, "create preload committed");
        } else if self.handlers.action.is_some() {
            if let Some(root) = shared.root::<L>(&loading) {
                shared.mark(root);
            }
        }

        let success = Mark::success();
        let Some(action) = &self.handlers.action else {
            let item = preloaded.ok_or(Failure::ReturnedNull)?;
            shared.commit(|prev| {
                modify_slot(prev, key, |slot| L::remark(slot, &success), shared.root::<L>(&success))
            })?;
            return Ok(item);
        };

        let created = action
            .call(params)
            .await
            .map_err(Failure::Rejected)?
            .ok_or(Failure::ReturnedNull)?;
        let slot = L::slot(created.clone(), &success);
        let root = shared.root::<L>(&success);
        if *inserted {
            shared.commit(|prev| replace_slot(prev, key, slot, root))?;
        } else {
            shared.commit(|prev| insert_slot(prev, key.clone(), slot, root))?;
        }
        debug!(container = shared.label(), key = ?key, "create committed");
        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Merge a patch into one existing entry. Resolves with the merged value.
pub struct UpdateMutation<C: Collection, L: Layout<C>, P, Patch> {
    shared: Arc<Shared<C>>,
    handlers: Arc<UpdateHandlers<P, C::Key, Patch, L::Item>>,
    _layout: PhantomData<fn() -> L>,
}

impl<C: Collection, L: Layout<C>, P, Patch> Clone for UpdateMutation<C, L, P, Patch> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            handlers: Arc::clone(&self.handlers),
            _layout: PhantomData,
        }
    }
}

impl<C, L, P, Patch> UpdateMutation<C, L, P, Patch>
where
    C: Collection,
    L: Layout<C>,
    L::Item: Merge<Patch>,
    P: Clone + Send + 'static,
    Patch: Send + 'static,
{
    pub async fn call(&self, params: P) -> MutationResult<L::Item> {
        let shared = &self.shared;
        let key = self.handlers.index(&params);
        let _guard = shared
            .locks
            .acquire(&key, shared.config.serialize_per_key)
            .await;

        let Some(original) = shared.store.get_snapshot().data.get(&key).cloned() else {
            debug!(container = shared.label(), key = ?key, "update target missing");
            return Err(MutationError::IndexNotFound);
        };

        let failure = match self.phases(&key, params.clone()).await {
            Ok(item) => return Ok(item),
            Err(Failure::Aborted(err)) => {
                warn!(container = shared.label(), key = ?key, error = %err, "update aborted");
                return Err(err);
            }
            Err(failure) => failure,
        };
        let message = failure.message();
        warn!(container = shared.label(), key = ?key, error = %message, "update failed");

        let failed = Mark::failed(message);
        let root = shared.root::<L>(&failed);
        match recover(self.handlers.error.as_ref(), params).await {
            Recovery::Replace(item) => {
                let slot = L::slot(item, &failed);
                shared.commit(|prev| replace_slot(prev, &key, slot, root))?;
            }
            Recovery::Keep if shared.config.rollback_on_error => {
                let slot = L::remark(&original, &failed);
                shared.commit(|prev| replace_slot(prev, &key, slot, root))?;
            }
            Recovery::Keep => {
                shared.commit(|prev| modify_slot(prev, &key, |slot| L::remark(slot, &failed), root))?;
            }
            Recovery::Failed(rejection) => {
                warn!(container = shared.label(), key = ?key, error = %rejection, "error handler rejected");
                let rejected = Mark::failed(ERROR_CALLBACK_REJECTED);
                shared.commit(|prev| {
                    modify_slot(
                        prev,
                        &key,
                        |slot| L::remark(slot, &rejected),
                        shared.root::<L>(&rejected),
                    )
                })?;
                return Err(MutationError::ErrorCallbackRejected);
            }
        }
        Err(failure.into_error())
    }

    async fn phases(&self, key: &C::Key, params: P) -> Result<L::Item, Failure> {
        let shared = &self.shared;
        let loading = Mark::loading();

        if let Some(preload) = &self.handlers.preload {
            let patch = preload
                .call(params.clone())
                .await
                .map_err(Failure::Rejected)?;
            shared.commit(|prev| {
                modify_slot(
                    prev,
                    key,
                    |slot| L::slot(L::item(slot).merge(patch), &loading),
                    shared.root::<L>(&loading),
                )
            })?;
            debug!(container = shared.label(), key = ?key, "update preload committed");
        } else if self.handlers.action.is_some() {
            shared.commit(|prev| {
                modify_slot(prev, key, |slot| L::remark(slot, &loading), shared.root::<L>(&loading))
            })?;
        }

        let success = Mark::success();
        let next = match &self.handlers.action {
            Some(action) => {
                let patch = action
                    .call(params)
                    .await
                    .map_err(Failure::Rejected)?
                    .ok_or(Failure::ReturnedNull)?;
                shared.commit(|prev| {
                    modify_slot(
                        prev,
                        key,
                        |slot| L::slot(L::item(slot).merge(patch), &success),
                        shared.root::<L>(&success),
                    )
                })?
            }
            None => shared.commit(|prev| {
                modify_slot(prev, key, |slot| L::remark(slot, &success), shared.root::<L>(&success))
            })?,
        };
        debug!(container = shared.label(), key = ?key, "update committed");
        Shared::<C>::item::<L>(&next, key).ok_or(Failure::Aborted(MutationError::IndexNotFound))
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// Remove one existing entry. Resolves with the value it held before the
/// call.
pub struct DeleteMutation<C: Collection, L: Layout<C>, P> {
    shared: Arc<Shared<C>>,
    handlers: Arc<DeleteHandlers<P, C::Key, L::Item>>,
    _layout: PhantomData<fn() -> L>,
}

impl<C: Collection, L: Layout<C>, P> Clone for DeleteMutation<C, L, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            handlers: Arc::clone(&self.handlers),
            _layout: PhantomData,
        }
    }
}

impl<C, L, P> DeleteMutation<C, L, P>
where
    C: Collection,
    L: Layout<C>,
    P: Clone + Send + 'static,
{
    pub async fn call(&self, params: P) -> MutationResult<L::Item> {
        let shared = &self.shared;
        let key = self.handlers.index(&params);
        let _guard = shared
            .locks
            .acquire(&key, shared.config.serialize_per_key)
            .await;

        let Some(original) = shared.store.get_snapshot().data.get(&key).cloned() else {
            debug!(container = shared.label(), key = ?key, "delete target missing");
            return Err(MutationError::IndexNotFound);
        };

        let mut removed = false;
        let failure = match self.phases(&key, params.clone(), &mut removed).await {
            Ok(()) => return Ok(L::item(&original).clone()),
            Err(Failure::Aborted(err)) => {
                warn!(container = shared.label(), key = ?key, error = %err, "delete aborted");
                return Err(err);
            }
            Err(failure) => failure,
        };
        let message = failure.message();
        warn!(container = shared.label(), key = ?key, error = %message, "delete failed");

        let failed = Mark::failed(message);
        let root = shared.root::<L>(&failed);
        match recover(self.handlers.error.as_ref(), params).await {
            Recovery::Replace(item) => {
                let slot = L::slot(item, &failed);
                shared.commit(|prev| restore_slot(prev, &key, slot, removed, root))?;
            }
            Recovery::Keep => {
                let slot = L::remark(&original, &failed);
                shared.commit(|prev| restore_slot(prev, &key, slot, removed, root))?;
            }
            Recovery::Failed(rejection) => {
                warn!(container = shared.label(), key = ?key, error = %rejection, "error handler rejected");
                let rejected = Mark::failed(ERROR_CALLBACK_REJECTED);
                let slot = L::remark(&original, &rejected);
                let root = shared.root::<L>(&rejected);
                shared.commit(|prev| restore_slot(prev, &key, slot, removed, root))?;
                return Err(MutationError::ErrorCallbackRejected);
            }
        }
        Err(failure.into_error())
    }

    async fn phases(&self, key: &C::Key, params: P, removed: &mut bool) -> Result<(), Failure> {
        let shared = &self.shared;
        let loading = Mark::loading();

        if let Some(preload) = &self.handlers.preload {
            let placeholder = preload
                .call(params.clone())
                .await
                .map_err(Failure::Rejected)?;
            let root = shared.root::<L>(&loading);
            match placeholder {
                Some(item) => {
                    let slot = L::slot(item, &loading);
                    shared.commit(|prev| replace_slot(prev, key, slot, root))?;
                }
                None => {
                    shared.commit_removal(key, root)?;
                    *removed = true;
                }
            }
            debug!(container = shared.label(), key = ?key, removed = *removed, "delete preload committed");
        } else if self.handlers.action.is_some() {
            shared.commit(|prev| {
                modify_slot(prev, key, |slot| L::remark(slot, &loading), shared.root::<L>(&loading))
            })?;
        }

        if let Some(action) = &self.handlers.action {
            action.call(params).await.map_err(Failure::Rejected)?;
        }

        let success = Mark::success();
        let root = shared.root::<L>(&success);
        if !*removed {
            shared.commit_removal(key, root)?;
        } else if let Some(root) = root {
            shared.mark(root);
        }
        debug!(container = shared.label(), key = ?key, "delete committed");
        Ok(())
    }
}
