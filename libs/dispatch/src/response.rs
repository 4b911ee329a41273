use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};

type BoxedResult<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Handle to the eventual outcome of a dispatched request
///
/// Resolves exactly once, to the correlated response or to the failure that
/// ended the request (timeout, connection teardown, remote error).
#[must_use = "a dispatched request is only observed by awaiting its ResponseFuture"]
pub struct ResponseFuture<T> {
    inner: BoxedResult<T>,
}

impl<T: Send + 'static> ResponseFuture<T> {
    /// Resolve from the single-assignment slot filled by the response router
    pub(crate) fn pending(slot: oneshot::Receiver<Result<T>>) -> Self {
        Self::from_future(async move {
            slot.await.unwrap_or_else(|_| {
                Err(Error::Network(Arc::new(
                    switchboard_fabric::Error::ConnectionClosed.into(),
                )))
            })
        })
    }

    /// A handle that is already resolved as failed
    pub fn failed(error: Error) -> Self {
        Self::from_future(async move { Err(error) })
    }

    /// Transform a successful outcome, e.g. to decode the body
    pub fn map<U, F>(self, f: F) -> ResponseFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let inner = self.inner;
        ResponseFuture::from_future(async move { inner.await.and_then(f) })
    }

    fn from_future(future: impl Future<Output = Result<T>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(future),
        }
    }
}

impl<T> Future for ResponseFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for ResponseFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFuture").finish_non_exhaustive()
    }
}
