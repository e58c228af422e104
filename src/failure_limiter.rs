//! Top-level entrypoint tying a counter backend to a window policy.
//!
//! [`FailureLimiter`] is generic over the [`AtomicCounter`] backend. Two are
//! shipped: [`LocalAtomicCounter`] (in-process) and, behind the `redis-tokio`
//! / `redis-smol` features, `RedisAtomicCounter`.

use std::future::Future;

use crate::{
    AtomicCounter, FailgateError, KeyPrefix, KeyTtl, LocalAtomicCounter, PeriodSeconds, Quota,
    RunValue, Verdict, WindowPolicy,
};

#[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
use crate::{FailgateRedisClient, RedisAtomicCounter, RedisCounterOptions};

/// Configuration for [`FailureLimiter`].
///
/// All fields are validated newtypes, so an options value is always usable.
///
/// # Examples
///
/// ```
/// use failgate::{FailureLimiterOptions, KeyPrefix, PeriodSeconds, Quota};
///
/// let options = FailureLimiterOptions {
///     period: PeriodSeconds::try_from(60).unwrap(),
///     quota: Quota::try_from(3).unwrap(),
///     key_prefix: KeyPrefix::try_from("login:failure:").unwrap(),
///     align: false,
/// };
///
/// assert_eq!(*options.quota, 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureLimiterOptions {
    /// Window length. Defaults to one day.
    pub period: PeriodSeconds,
    /// Failures tolerated inside one window. Defaults to 6.
    pub quota: Quota,
    /// Prepended to every caller key. Defaults to `"limit:period:failure:"`.
    pub key_prefix: KeyPrefix,
    /// Align window ends to the local clock grid instead of counting down
    /// from the first failure. Defaults to `false`.
    pub align: bool,
}

/// Failure-counting rate limiter.
///
/// Stateless apart from its immutable options: all serialization happens in
/// the counter backend, so a single instance can be shared across tasks
/// (wrap it in an [`Arc`](std::sync::Arc)).
///
/// Every method is one round trip to the backend. No call is retried. Dropping
/// a returned future cancels the call; for a mutating call the counter may or
/// may not have been updated.
pub struct FailureLimiter<C = LocalAtomicCounter> {
    counter: C,
    options: FailureLimiterOptions,
    window_policy: WindowPolicy,
}

impl FailureLimiter<LocalAtomicCounter> {
    /// Create a limiter over a fresh in-process counter.
    pub fn local(options: FailureLimiterOptions) -> Self {
        Self::new(LocalAtomicCounter::new(), options)
    }
}

#[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
impl FailureLimiter<RedisAtomicCounter> {
    /// Create a limiter backed by Redis with default counter options.
    pub fn redis(client: FailgateRedisClient, options: FailureLimiterOptions) -> Self {
        Self::new(
            RedisAtomicCounter::new(client, RedisCounterOptions::default()),
            options,
        )
    }
}

impl<C: AtomicCounter> FailureLimiter<C> {
    /// Create a limiter over any [`AtomicCounter`].
    pub fn new(counter: C, options: FailureLimiterOptions) -> Self {
        let window_policy = WindowPolicy::new(options.period, options.align);

        Self {
            counter,
            options,
            window_policy,
        }
    }

    /// The options this limiter was built with.
    pub fn options(&self) -> &FailureLimiterOptions {
        &self.options
    }

    /// The window policy derived from the options.
    pub fn window_policy(&self) -> &WindowPolicy {
        &self.window_policy
    }

    /// The counter backend.
    pub fn counter(&self) -> &C {
        &self.counter
    }

    /// The store key used for `key`: `<key_prefix><key>`.
    pub fn format_key(&self, key: &str) -> String {
        format!("{}{}", &*self.options.key_prefix, key)
    }

    /// Record the outcome of an attempt for `key` and return the verdict.
    ///
    /// - `success == true`: returns [`Verdict::Success`], the counter is untouched
    /// - `success == false`: counts a failure, returns [`Verdict::InQuota`] while
    ///   the count is `<= quota` and [`Verdict::OverQuota`] after
    ///
    /// The first failure of a window installs the TTL computed by the
    /// [`WindowPolicy`]; later failures leave it alone.
    ///
    /// # Errors
    ///
    /// - Transport errors from the backend, unmodified
    /// - [`FailgateError::UnknownCode`] if the script answers outside the protocol
    ///
    /// Whether to fail open or closed on error is up to the caller.
    pub async fn check(&self, key: &str, success: bool) -> Result<Verdict, FailgateError> {
        let key = self.format_key(key);
        let expire_seconds = self.window_policy.expire_seconds();

        let code = self
            .counter
            .increment_and_check(&key, *self.options.quota, expire_seconds, success)
            .await?;

        match Verdict::from_code(code) {
            Verdict::Unknown => {
                tracing::warn!(key = %key, code, "failure_limiter.check, unknown result code");
                Err(FailgateError::UnknownCode(code))
            }
            verdict => {
                tracing::debug!(key = %key, ?verdict, expire_seconds, "failure_limiter.check");
                Ok(verdict)
            }
        }
    } // end method check

    /// Same as [`check`](Self::check) with `success = result.is_ok()`.
    pub fn check_result<'a, T, E>(
        &'a self,
        key: &'a str,
        result: &Result<T, E>,
    ) -> impl Future<Output = Result<Verdict, FailgateError>> + 'a {
        self.check(key, result.is_ok())
    }

    /// Push `key` over quota so the next check reads [`Verdict::OverQuota`].
    ///
    /// Never lowers a count that is already higher. A key without a TTL gets
    /// the one computed by the [`WindowPolicy`].
    pub async fn set_quota_full(&self, key: &str) -> Result<(), FailgateError> {
        let key = self.format_key(key);
        let expire_seconds = self.window_policy.expire_seconds();

        self.counter
            .force_full(&key, *self.options.quota, expire_seconds)
            .await?;

        tracing::debug!(key = %key, expire_seconds, "failure_limiter.set_quota_full");

        Ok(())
    } // end method set_quota_full

    /// Remove the counter for `key`. Removing an absent counter is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), FailgateError> {
        self.counter.delete(&self.format_key(key)).await
    }

    /// Time to live of the counter for `key`.
    ///
    /// [`KeyTtl::Missing`] if absent, [`KeyTtl::Persistent`] if it never expires.
    pub async fn ttl(&self, key: &str) -> Result<KeyTtl, FailgateError> {
        let raw = self.counter.ttl(&self.format_key(key)).await?;

        KeyTtl::from_raw(raw).ok_or_else(|| FailgateError::UnknownReply(vec![raw]))
    }

    /// Current failure count for `key`, `None` if there is no counter.
    pub async fn get_count(&self, key: &str) -> Result<Option<u64>, FailgateError> {
        match self.counter.get(&self.format_key(key)).await? {
            None => Ok(None),
            Some(raw) => u64::try_from(raw)
                .map(Some)
                .map_err(|_| FailgateError::UnknownReply(vec![raw])),
        }
    }

    /// Snapshot of the counter for `key` without mutating it.
    pub async fn get_run_value(&self, key: &str) -> Result<RunValue, FailgateError> {
        let key = self.format_key(key);
        let raw = self.counter.inspect(&key).await?;

        decode_run_value(raw).inspect_err(|err| {
            tracing::warn!(key = %key, error = %err, "failure_limiter.get_run_value, unexpected reply");
        })
    }
}

/// Decode an inspection reply: `[0]` or `[exists, count, ttl]`.
///
/// A TTL of `-2` means the key is gone, whatever the exists flag says.
pub(crate) fn decode_run_value(raw: Vec<i64>) -> Result<RunValue, FailgateError> {
    let decoded = match *raw.as_slice() {
        [0] => Some(RunValue::absent()),
        [exists, count, ttl] => match (KeyTtl::from_raw(ttl), u64::try_from(count)) {
            (Some(ttl), Ok(count)) => Some(RunValue {
                exist: exists == 1 && ttl != KeyTtl::Missing,
                count,
                ttl,
            }),
            _ => None,
        },
        _ => None,
    };

    decoded.ok_or_else(|| FailgateError::UnknownReply(raw))
}
