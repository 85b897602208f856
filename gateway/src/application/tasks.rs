//! Continuations and background tasks over watch futures.

use std::fmt::Display;
use std::future::{Future, IntoFuture};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Apply `transform` to the resolved value. Rejections propagate unchanged.
pub async fn after<T, U, E, F>(future: impl IntoFuture<Output = Result<T, E>>, transform: F) -> Result<U, E>
where
    F: FnOnce(T) -> Result<U, E>,
{
    transform(future.await?)
}

/// Chain an asynchronous continuation on the resolved value
pub async fn after_async<T, U, E, F, G>(
    future: impl IntoFuture<Output = Result<T, E>>,
    continuation: F,
) -> Result<U, E>
where
    F: FnOnce(T) -> G,
    G: IntoFuture<Output = Result<U, E>>,
{
    continuation(future.await?).await
}

/// Wait for `future`, discard its value, then run `continuation`
pub async fn after_dropped<T, U, E, F, G>(
    future: impl IntoFuture<Output = Result<T, E>>,
    continuation: F,
) -> Result<U, E>
where
    F: FnOnce() -> G,
    G: IntoFuture<Output = Result<U, E>>,
{
    future.await?;
    continuation().await
}

/// Run `task` in the background. Errors and panics are logged under `name`.
pub fn spawn<F, E>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let inner = tokio::spawn(task);
    tokio::spawn(async move {
        match inner.await {
            Ok(Ok(())) => tracing::trace!(task = name, "Task completed"),
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task failed"),
            Err(join) if join.is_panic() => tracing::error!(task = name, "Task panicked"),
            Err(_) => tracing::debug!(task = name, "Task cancelled"),
        }
    })
}

/// Like [`spawn`] after sleeping for `timeout`
pub fn delay<F, E>(timeout: Duration, name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    spawn(name, async move {
        tokio::time::sleep(timeout).await;
        task.await
    })
}
