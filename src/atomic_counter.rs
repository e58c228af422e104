//! The counter protocol shared by every storage backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::FailgateError;

/// Atomic per-key failure counter.
///
/// Implementations must execute [`increment_and_check`](Self::increment_and_check),
/// [`force_full`](Self::force_full) and [`inspect`](Self::inspect) atomically
/// with respect to other calls on the same key. Keys passed in are already
/// prefixed.
///
/// Result codes of `increment_and_check` are `0` (success), `1` (in quota) and
/// `2` (over quota). Anything else is treated as a protocol violation by
/// [`crate::FailureLimiter`].
#[async_trait]
pub trait AtomicCounter: Send + Sync {
    /// Record the outcome of an attempt.
    ///
    /// - `success == true`: nothing is mutated, returns `0`.
    /// - `success == false`: increments the counter. If the key did not exist
    ///   it is created with a TTL of `expire_seconds`; an existing TTL is kept.
    ///   Returns `1` if the new count is `<= quota`, `2` otherwise.
    async fn increment_and_check(
        &self,
        key: &str,
        quota: u64,
        expire_seconds: u64,
        success: bool,
    ) -> Result<i64, FailgateError>;

    /// Raise the counter to at least `quota + 1`.
    ///
    /// Installs `expire_seconds` only when the key carries no TTL yet.
    async fn force_full(
        &self,
        key: &str,
        quota: u64,
        expire_seconds: u64,
    ) -> Result<(), FailgateError>;

    /// Read `[0]` for an absent key or `[1, count, ttl]` without mutating.
    async fn inspect(&self, key: &str) -> Result<Vec<i64>, FailgateError>;

    /// Plain read of the stored count.
    async fn get(&self, key: &str) -> Result<Option<i64>, FailgateError>;

    /// Remove the key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), FailgateError>;

    /// Raw `TTL` in seconds: `-2` absent, `-1` no expiry.
    async fn ttl(&self, key: &str) -> Result<i64, FailgateError>;
}

#[async_trait]
impl<C: AtomicCounter + ?Sized> AtomicCounter for Arc<C> {
    async fn increment_and_check(
        &self,
        key: &str,
        quota: u64,
        expire_seconds: u64,
        success: bool,
    ) -> Result<i64, FailgateError> {
        (**self)
            .increment_and_check(key, quota, expire_seconds, success)
            .await
    }

    async fn force_full(
        &self,
        key: &str,
        quota: u64,
        expire_seconds: u64,
    ) -> Result<(), FailgateError> {
        (**self).force_full(key, quota, expire_seconds).await
    }

    async fn inspect(&self, key: &str) -> Result<Vec<i64>, FailgateError> {
        (**self).inspect(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, FailgateError> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), FailgateError> {
        (**self).delete(key).await
    }

    async fn ttl(&self, key: &str) -> Result<i64, FailgateError> {
        (**self).ttl(key).await
    }
}
