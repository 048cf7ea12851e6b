//! The unit of work executed under a policy.
//!
//! An operation is invoked once per attempt and receives a
//! [`CancellationToken`]. The token is cancelled when the attempt times out or
//! the whole call is dropped; operations that spawn work of their own should
//! watch it and stop early. Cancellation is advisory: the engine drops the
//! attempt's future but cannot stop threads the operation started.

use std::future::Future;
use std::sync::Arc;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// A repeatable, fallible unit of work.
pub trait Operation<T, E>: Send + Sync {
    /// Start one attempt.
    fn invoke(&self, cancel: CancellationToken) -> BoxFuture<'static, Result<T, E>>;
}

impl<F, Fut, T, E> Operation<T, E> for F
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn invoke(&self, cancel: CancellationToken) -> BoxFuture<'static, Result<T, E>> {
        Box::pin(self(cancel))
    }
}

/// Error of an operation adapted with [`blocking`].
#[derive(Debug, Error)]
pub enum BlockingError<E> {
    #[error("{0}")]
    Inner(E),

    #[error("blocking task failed: {0}")]
    Join(#[from] JoinError),
}

/// Adapt a synchronous closure into an [`Operation`].
///
/// Each attempt runs on Tokio's blocking pool. On timeout the thread keeps
/// running until the closure returns; it can poll the token to bail out early.
pub fn blocking<F, T, E>(f: F) -> impl Operation<T, BlockingError<E>>
where
    F: Fn(&CancellationToken) -> Result<T, E> + Send + Sync + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let f = Arc::new(f);
    move |cancel: CancellationToken| {
        let f = Arc::clone(&f);
        async move {
            match tokio::task::spawn_blocking(move || f(&cancel)).await {
                Ok(result) => result.map_err(BlockingError::Inner),
                Err(e) => Err(BlockingError::Join(e)),
            }
        }
    }
}
