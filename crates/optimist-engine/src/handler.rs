//! Caller-supplied async handlers and the failure bookkeeping shared by the
//! scalar and keyed engines.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use optimist_types::{normalize_error, MutationError, Rejection, ACTION_RETURNED_NULL};

/// Boxed, sendable future returned by a handler.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// One async phase: takes the call parameters, yields a value or a
/// [`Rejection`].
pub struct Handler<P, T> {
    f: Arc<dyn Fn(P) -> BoxFuture<Result<T, Rejection>> + Send + Sync>,
}

impl<P, T> Clone for Handler<P, T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<P, T> fmt::Debug for Handler<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

impl<P: 'static, T: 'static> Handler<P, T> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Rejection>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |params: P| Box::pin(f(params)) as BoxFuture<Result<T, Rejection>>),
        }
    }

    pub async fn call(&self, params: P) -> Result<T, Rejection> {
        (self.f)(params).await
    }
}

/// Resolves the key a keyed operation addresses.
pub struct IndexFn<P, K> {
    f: Arc<dyn Fn(&P) -> K + Send + Sync>,
}

impl<P, K> Clone for IndexFn<P, K> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<P: 'static, K: 'static> IndexFn<P, K> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&P) -> K + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    pub fn resolve(&self, params: &P) -> K {
        (self.f)(params)
    }
}

/// Why the preload/action phases did not complete.
#[derive(Debug)]
pub(crate) enum Failure {
    /// A preload or action rejected.
    Rejected(Rejection),
    /// An action resolved with `None` where a value was required.
    ReturnedNull,
    /// Addressing broke mid-flight; skips recovery.
    Aborted(MutationError),
}

impl Failure {
    /// The message written into the snapshot's `error` field.
    pub(crate) fn message(&self) -> String {
        match self {
            Self::Rejected(rejection) => normalize_error(rejection),
            Self::ReturnedNull => ACTION_RETURNED_NULL.to_string(),
            Self::Aborted(err) => err.to_string(),
        }
    }

    /// The error the caller sees.
    pub(crate) fn into_error(self) -> MutationError {
        match self {
            Self::Rejected(rejection) => MutationError::from_rejection(&rejection),
            Self::ReturnedNull => MutationError::ActionReturnedNull,
            Self::Aborted(err) => err,
        }
    }
}

impl From<MutationError> for Failure {
    fn from(err: MutationError) -> Self {
        Self::Aborted(err)
    }
}

/// Outcome of the error phase.
pub(crate) enum Recovery<T> {
    /// The error handler supplied a replacement value.
    Replace(T),
    /// No handler, or it resolved with `None`: apply the default policy.
    Keep,
    /// The error handler itself failed.
    Failed(Rejection),
}

pub(crate) async fn recover<P, T>(handler: Option<&Handler<P, Option<T>>>, params: P) -> Recovery<T>
where
    P: 'static,
    T: 'static,
{
    let Some(handler) = handler else {
        return Recovery::Keep;
    };
    match handler.call(params).await {
        Ok(Some(value)) => Recovery::Replace(value),
        Ok(None) => Recovery::Keep,
        Err(rejection) => Recovery::Failed(rejection),
    }
}
