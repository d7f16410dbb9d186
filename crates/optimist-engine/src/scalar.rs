//! Scalar mutation engine.
//!
//! Drives one value through preload → action → error. The same engine backs
//! [`ScalarContainer`] and the replace-all operation of keyed containers,
//! which treat their whole collection as the scalar value.

use std::sync::Arc;

use optimist_store::{Listener, SnapshotStore, Subscription};
use optimist_types::{MutationError, MutationResult, Snapshot, Status, ERROR_CALLBACK_REJECTED};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::bundle::ReplaceHandlers;
use crate::config::ContainerConfig;
use crate::handler::{recover, Failure, Recovery};
use crate::transitions::{mark_root, set_data, Mark};

/// A container holding exactly one logical value.
pub struct ScalarContainer<D> {
    store: SnapshotStore<Snapshot<D>>,
    config: Arc<ContainerConfig>,
}

impl<D> Clone for ScalarContainer<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<D: Clone + Send + Sync + 'static> ScalarContainer<D> {
    /// New container in the `unsent` state.
    pub fn new(data: D) -> Self {
        Self::with_config(data, ContainerConfig::default())
    }

    pub fn with_config(data: D, config: ContainerConfig) -> Self {
        Self::from_snapshot(Snapshot::new(data), config)
    }

    /// Start from an explicit snapshot, e.g. data that was already loaded.
    pub fn from_snapshot(snapshot: Snapshot<D>, config: ContainerConfig) -> Self {
        debug!(container = %config.label, "scalar container created");
        Self {
            store: SnapshotStore::new(snapshot),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &SnapshotStore<Snapshot<D>> {
        &self.store
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn get_snapshot(&self) -> Arc<Snapshot<D>> {
        self.store.get_snapshot()
    }

    pub fn status(&self) -> Status {
        self.store.get_snapshot().status
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.store.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot<D>>> {
        self.store.watch()
    }

    /// Build a replace mutation from a handler bundle.
    pub fn make_replace<P>(&self, handlers: ReplaceHandlers<P, D>) -> ReplaceMutation<P, D>
    where
        P: Clone + Send + 'static,
    {
        ReplaceMutation::new(self.store.clone(), Arc::clone(&self.config), handlers)
    }
}

/// A reusable replace operation bound to one container.
pub struct ReplaceMutation<P, D> {
    store: SnapshotStore<Snapshot<D>>,
    config: Arc<ContainerConfig>,
    handlers: Arc<ReplaceHandlers<P, D>>,
}

impl<P, D> Clone for ReplaceMutation<P, D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: Arc::clone(&self.config),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<P, D> ReplaceMutation<P, D>
where
    P: Clone + Send + 'static,
    D: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        store: SnapshotStore<Snapshot<D>>,
        config: Arc<ContainerConfig>,
        handlers: ReplaceHandlers<P, D>,
    ) -> Self {
        Self {
            store,
            config,
            handlers: Arc::new(handlers),
        }
    }

    /// Run preload, action, and (on failure) error, resolving with the
    /// committed value.
    pub async fn call(&self, params: P) -> MutationResult<D> {
        run_replace(&self.store, &self.config, &self.handlers, params).await
    }
}

async fn run_replace<P, D>(
    store: &SnapshotStore<Snapshot<D>>,
    config: &ContainerConfig,
    handlers: &ReplaceHandlers<P, D>,
    params: P,
) -> MutationResult<D>
where
    P: Clone + Send + 'static,
    D: Clone + Send + Sync + 'static,
{
    let label = config.label.as_str();
    let original = config
        .rollback_on_error
        .then(|| store.get_snapshot().data.clone());

    let failure = match replace_phases(store, handlers, params.clone(), label).await {
        Ok(data) => return Ok(data),
        Err(failure) => failure,
    };
    let message = failure.message();
    warn!(container = label, error = %message, "replace failed");

    let failed = Mark::failed(message);
    match recover(handlers.error.as_ref(), params).await {
        Recovery::Replace(data) => store.update(set_data(data, &failed)),
        Recovery::Keep => match original {
            Some(data) => store.update(set_data(data, &failed)),
            None => {
                store.update_with(|prev| mark_root(prev, &failed));
            }
        },
        Recovery::Failed(rejection) => {
            warn!(container = label, error = %rejection, "error handler rejected");
            store.update_with(|prev| mark_root(prev, &Mark::failed(ERROR_CALLBACK_REJECTED)));
            return Err(MutationError::ErrorCallbackRejected);
        }
    }
    debug!(container = label, status = %Status::Error, "error committed");
    Err(failure.into_error())
}

async fn replace_phases<P, D>(
    store: &SnapshotStore<Snapshot<D>>,
    handlers: &ReplaceHandlers<P, D>,
    params: P,
    label: &str,
) -> Result<D, Failure>
where
    P: Clone + Send + 'static,
    D: Clone + Send + Sync + 'static,
{
    if let Some(preload) = &handlers.preload {
        let data = preload
            .call(params.clone())
            .await
            .map_err(Failure::Rejected)?;
        store.update(set_data(data, &Mark::loading()));
        debug!(container = label, status = %Status::Loading, "preload committed");
    } else if handlers.action.is_some() {
        store.update_with(|prev| mark_root(prev, &Mark::loading()));
        debug!(container = label, status = %Status::Loading, "loading committed");
    }

    let Some(action) = &handlers.action else {
        // Nothing to run: the current data is the result.
        let next = store.update_with(|prev| mark_root(prev, &Mark::success()));
        return Ok(next.data.clone());
    };
    let data = action.call(params).await.map_err(Failure::Rejected)?;
    store.update(set_data(data.clone(), &Mark::success()));
    debug!(container = label, status = %Status::Success, "action committed");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use optimist_types::{Rejection, REJECTED_WITHOUT_MESSAGE};

    /// Record every snapshot observed by a listener.
    fn record<D: Clone + Send + Sync + 'static>(
        container: &ScalarContainer<D>,
    ) -> (Arc<Mutex<Vec<Snapshot<D>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let reader = container.store().clone();
        let sub = container.subscribe(Arc::new(move || {
            log.lock().unwrap().push((*reader.get_snapshot()).clone());
        }));
        (seen, sub)
    }

    fn statuses<D>(seen: &Mutex<Vec<Snapshot<D>>>) -> Vec<Status> {
        seen.lock().unwrap().iter().map(|s| s.status).collect()
    }

    #[tokio::test]
    async fn preload_then_action_commits_loading_then_success() {
        let container = ScalarContainer::new(0u32);
        let (seen, _sub) = record(&container);
        let bump = container.make_replace(
            ReplaceHandlers::new()
                .preload(|n: u32| async move { Ok::<_, Rejection>(n) })
                .action(|n: u32| async move { Ok::<_, Rejection>(n + 1) }),
        );

        assert_eq!(bump.call(10).await.unwrap(), 11);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Snapshot::loading(10));
        assert_eq!(seen[1], Snapshot::success(11));
    }

    #[tokio::test]
    async fn action_alone_still_passes_through_loading() {
        let container = ScalarContainer::new("old".to_string());
        let (seen, _sub) = record(&container);
        let set = container.make_replace(
            ReplaceHandlers::new().action(|s: String| async move { Ok::<_, Rejection>(s) }),
        );

        set.call("new".into()).await.unwrap();
        assert_eq!(statuses(&seen), vec![Status::Loading, Status::Success]);
        assert_eq!(seen.lock().unwrap()[0].data, "old");
        assert_eq!(container.get_snapshot().data, "new");
    }

    #[tokio::test]
    async fn no_action_resolves_with_current_data() {
        let container = ScalarContainer::new(3i64);
        let preload_only = container.make_replace(
            ReplaceHandlers::new().preload(|n: i64| async move { Ok::<_, Rejection>(n * 2) }),
        );
        assert_eq!(preload_only.call(4).await.unwrap(), 8);
        assert_eq!(*container.get_snapshot(), Snapshot::success(8));
    }

    #[tokio::test]
    async fn preload_failure_skips_action_and_keeps_data() {
        let container = ScalarContainer::new(1u8);
        let (seen, _sub) = record(&container);
        let ran_action = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran_action);
        let op = container.make_replace(
            ReplaceHandlers::new()
                .preload(|_: ()| async { Err::<u8, _>(Rejection::from("preload broke")) })
                .action(move |_: ()| {
                    let flag = Arc::clone(&flag);
                    async move {
                        *flag.lock().unwrap() = true;
                        Ok::<_, Rejection>(9)
                    }
                }),
        );

        let err = op.call(()).await.unwrap_err();
        assert_eq!(err, MutationError::Rejected("preload broke".into()));
        assert!(!*ran_action.lock().unwrap());
        assert_eq!(statuses(&seen), vec![Status::Error]);
        assert_eq!(*container.get_snapshot(), Snapshot::failed(1, "preload broke"));
    }

    #[tokio::test]
    async fn action_failure_keeps_preloaded_data() {
        let container = ScalarContainer::new(1u8);
        let op = container.make_replace(
            ReplaceHandlers::new()
                .preload(|_: ()| async { Ok::<_, Rejection>(5u8) })
                .action(|_: ()| async { Err::<u8, _>(Rejection::from("X")) }),
        );

        assert_eq!(op.call(()).await.unwrap_err().to_string(), "X");
        assert_eq!(*container.get_snapshot(), Snapshot::failed(5, "X"));
    }

    #[tokio::test]
    async fn rollback_config_restores_original_data() {
        let container =
            ScalarContainer::with_config(1u8, ContainerConfig::default().with_rollback(true));
        let op = container.make_replace(
            ReplaceHandlers::new()
                .preload(|_: ()| async { Ok::<_, Rejection>(5u8) })
                .action(|_: ()| async { Err::<u8, _>(Rejection::from("X")) }),
        );

        op.call(()).await.unwrap_err();
        assert_eq!(*container.get_snapshot(), Snapshot::failed(1, "X"));
    }

    #[tokio::test]
    async fn error_handler_replacement_is_committed() {
        let container = ScalarContainer::new(vec![1, 2]);
        let op = container.make_replace(
            ReplaceHandlers::new()
                .action(|_: ()| async { Err::<Vec<i32>, _>(Rejection::from("offline")) })
                .error(|_: ()| async { Ok::<_, Rejection>(Some(vec![0])) }),
        );

        let err = op.call(()).await.unwrap_err();
        assert_eq!(err, MutationError::Rejected("offline".into()));
        assert_eq!(*container.get_snapshot(), Snapshot::failed(vec![0], "offline"));
    }

    #[tokio::test]
    async fn error_handler_rejection_supersedes() {
        let container = ScalarContainer::new(7u16);
        let op = container.make_replace(
            ReplaceHandlers::new()
                .preload(|_: ()| async { Ok::<_, Rejection>(8u16) })
                .action(|_: ()| async { Err::<u16, _>(Rejection::from("first")) })
                .error(|_: ()| async { Err::<Option<u16>, _>(Rejection::from("second")) }),
        );

        let err = op.call(()).await.unwrap_err();
        assert_eq!(err, MutationError::ErrorCallbackRejected);
        let snap = container.get_snapshot();
        assert_eq!(snap.data, 8);
        assert_eq!(snap.status, Status::Error);
        assert_eq!(snap.error.as_deref(), Some(ERROR_CALLBACK_REJECTED));
    }

    #[tokio::test]
    async fn opaque_failure_is_unknown_reject_with_fallback_message() {
        let container = ScalarContainer::new(());
        let op = container.make_replace(
            ReplaceHandlers::new().action(|_: ()| async { Err::<(), _>(Rejection::Opaque) }),
        );

        let err = op.call(()).await.unwrap_err();
        assert_eq!(err, MutationError::UnknownPreloadOrActionReject);
        assert_eq!(
            container.get_snapshot().error.as_deref(),
            Some(REJECTED_WITHOUT_MESSAGE)
        );
    }

    #[tokio::test]
    async fn recovers_from_error_on_next_call() {
        let container = ScalarContainer::new(0u32);
        let fail = container.make_replace(
            ReplaceHandlers::new().action(|_: u32| async { Err::<u32, _>(Rejection::from("no")) }),
        );
        let ok = container.make_replace(
            ReplaceHandlers::new().action(|n: u32| async move { Ok::<_, Rejection>(n) }),
        );

        fail.call(1).await.unwrap_err();
        assert_eq!(container.status(), Status::Error);
        ok.call(2).await.unwrap();
        assert_eq!(*container.get_snapshot(), Snapshot::success(2));
    }

    #[tokio::test]
    async fn anyhow_errors_are_normalized() {
        let container = ScalarContainer::new(0u8);
        let op = container.make_replace(ReplaceHandlers::new().action(|_: ()| async {
            Err::<u8, Rejection>(anyhow::anyhow!("timeout after 5s").into())
        }));
        assert_eq!(op.call(()).await.unwrap_err().to_string(), "timeout after 5s");
    }
}
