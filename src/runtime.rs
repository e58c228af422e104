//! Async runtime glue for the Redis backend and the local cleanup loop.
//!
//! Tokio wins when both runtime features are enabled.

#[cfg(feature = "redis-tokio")]
pub(crate) use with_tokio::*;

#[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
pub(crate) use with_smol::*;

#[cfg(feature = "redis-tokio")]
mod with_tokio {
    use std::{future::Future, time::Duration};

    use crate::FailgateError;

    /// Ticker driving `LocalAtomicCounter::run_cleanup_loop`.
    pub(crate) type Interval = tokio::time::Interval;

    pub(crate) fn new_interval(every: Duration) -> Interval {
        tokio::time::interval(every)
    }

    pub(crate) async fn tick(interval: &mut Interval) {
        interval.tick().await;
    }

    /// Detach a background task onto the ambient runtime.
    pub(crate) fn spawn_task<F>(task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(task);
    }

    /// Bound a store round trip by `limit`.
    pub(crate) async fn timeout<F: Future>(
        limit: Duration,
        call: F,
    ) -> Result<F::Output, FailgateError> {
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| FailgateError::Timeout(limit))
    }
}

#[cfg(all(feature = "redis-smol", not(feature = "redis-tokio")))]
mod with_smol {
    use std::{future::Future, time::Duration};

    use futures::StreamExt;

    use crate::FailgateError;

    /// Ticker driving `LocalAtomicCounter::run_cleanup_loop`.
    pub(crate) type Interval = smol::Timer;

    pub(crate) fn new_interval(every: Duration) -> Interval {
        smol::Timer::interval(every)
    }

    pub(crate) async fn tick(interval: &mut Interval) {
        interval.next().await;
    }

    /// Detach a background task onto smol's global executor.
    pub(crate) fn spawn_task<F>(task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        smol::spawn(task).detach();
    }

    /// Bound a store round trip by `limit`.
    pub(crate) async fn timeout<F: Future>(
        limit: Duration,
        call: F,
    ) -> Result<F::Output, FailgateError> {
        smol::future::or(async { Ok(call.await) }, async {
            smol::Timer::after(limit).await;
            Err(FailgateError::Timeout(limit))
        })
        .await
    }
}
