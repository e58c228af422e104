use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{
    AtomicCounter, FailgateError,
    common::{CODE_IN_QUOTA, CODE_OVER_QUOTA, CODE_SUCCESS, TTL_MISSING, TTL_PERSISTENT},
};

#[derive(Debug, Default)]
pub(crate) struct CounterEntry {
    pub count: u64,
    pub expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Remaining seconds, rounded to the nearest second like Redis does.
    fn ttl_raw(&self, now: Instant) -> i64 {
        match self.expires_at {
            None => TTL_PERSISTENT,
            Some(at) => {
                let remaining_ms = at.saturating_duration_since(now).as_millis();
                i64::try_from((remaining_ms + 500) / 1000).unwrap_or(i64::MAX)
            }
        }
    }
}

fn expiry_after(now: Instant, expire_seconds: u64) -> Result<Instant, FailgateError> {
    now.checked_add(Duration::from_secs(expire_seconds))
        .ok_or_else(|| {
            FailgateError::InvalidPeriod(format!(
                "{expire_seconds} seconds from now is not representable"
            ))
        })
}

fn count_to_i64(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// In-process implementation of [`AtomicCounter`].
///
/// # Atomicity
///
/// Every mutating operation runs while holding the [`DashMap`] entry for the
/// key, which serializes concurrent callers on the same key. Different keys
/// only contend when they share a shard.
///
/// # Expiry
///
/// - Expired entries are treated as absent on access and dropped lazily
/// - [`cleanup`](Self::cleanup) removes every expired entry at once
/// - [`run_cleanup_loop`](Self::run_cleanup_loop) calls it periodically
///   (requires a runtime feature)
///
/// TTLs are measured with [`Instant`], so they are immune to wall-clock jumps.
#[derive(Debug, Default)]
pub struct LocalAtomicCounter {
    entries: DashMap<String, CounterEntry>,
}

impl LocalAtomicCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let before = self.entries.len();

        self.entries.retain(|_, entry| !entry.is_expired(now));

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "local.cleanup, evicted expired counters");
        }
    } // end method cleanup

    /// Periodically evict expired entries in a background task.
    ///
    /// The task holds a weak reference and stops once the counter is dropped.
    #[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
    pub fn run_cleanup_loop(self: &std::sync::Arc<Self>, every: Duration) {
        let weak = std::sync::Arc::downgrade(self);

        crate::runtime::spawn_task(async move {
            let mut interval = crate::runtime::new_interval(every);

            loop {
                crate::runtime::tick(&mut interval).await;

                let Some(counter) = weak.upgrade() else {
                    tracing::debug!("local.cleanup, counter dropped, stopping loop");
                    break;
                };

                counter.cleanup();
            }
        });
    } // end method run_cleanup_loop

    fn read<R>(&self, key: &str, f: impl FnOnce(&CounterEntry, Instant) -> R) -> Option<R> {
        let now = Instant::now();

        let entry = self.entries.get(key)?;
        if !entry.is_expired(now) {
            return Some(f(&*entry, now));
        }
        drop(entry);

        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        tracing::trace!(key, "local.expire, dropped expired counter");

        None
    }
}

#[async_trait]
impl AtomicCounter for LocalAtomicCounter {
    async fn increment_and_check(
        &self,
        key: &str,
        quota: u64,
        expire_seconds: u64,
        success: bool,
    ) -> Result<i64, FailgateError> {
        if success {
            return Ok(CODE_SUCCESS);
        }

        let now = Instant::now();
        let expires_at = expiry_after(now, expire_seconds)?;
        let mut entry = self.entries.entry(key.to_string()).or_default();

        if entry.is_expired(now) {
            *entry = CounterEntry::default();
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count == 1 {
            entry.expires_at = Some(expires_at);
        }

        let count = entry.count;
        drop(entry);

        if count <= quota {
            Ok(CODE_IN_QUOTA)
        } else {
            Ok(CODE_OVER_QUOTA)
        }
    } // end method increment_and_check

    async fn force_full(
        &self,
        key: &str,
        quota: u64,
        expire_seconds: u64,
    ) -> Result<(), FailgateError> {
        let now = Instant::now();
        let expires_at = expiry_after(now, expire_seconds)?;
        let full = quota.saturating_add(1);
        let mut entry = self.entries.entry(key.to_string()).or_default();

        if entry.is_expired(now) {
            *entry = CounterEntry::default();
        }

        if entry.count < full {
            entry.count = full;
        }

        if entry.expires_at.is_none() {
            entry.expires_at = Some(expires_at);
        }

        Ok(())
    } // end method force_full

    async fn inspect(&self, key: &str) -> Result<Vec<i64>, FailgateError> {
        let snapshot = self.read(key, |entry, now| {
            vec![1, count_to_i64(entry.count), entry.ttl_raw(now)]
        });

        Ok(snapshot.unwrap_or_else(|| vec![0]))
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, FailgateError> {
        Ok(self.read(key, |entry, _| count_to_i64(entry.count)))
    }

    async fn delete(&self, key: &str) -> Result<(), FailgateError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64, FailgateError> {
        Ok(self
            .read(key, |entry, now| entry.ttl_raw(now))
            .unwrap_or(TTL_MISSING))
    }
}
