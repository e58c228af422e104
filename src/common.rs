use std::{ops::Deref, sync::Arc, time::Duration};

use crate::FailgateError;

/// Length of a counting window in whole seconds.
///
/// Must be between 1 and [`PeriodSeconds::MAX`]. Defaults to one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodSeconds(u64);

impl PeriodSeconds {
    /// Longest accepted window: 100 years of 365 days.
    ///
    /// Keeps `Instant` and `DateTime` arithmetic in range and stays far below
    /// the millisecond limit of Redis `EXPIRE`.
    pub const MAX: u64 = 100 * 365 * 24 * 60 * 60;
}

impl Default for PeriodSeconds {
    /// Returns a period of 86400 seconds (24 hours).
    fn default() -> Self {
        Self(24 * 60 * 60)
    }
}

impl Deref for PeriodSeconds {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for PeriodSeconds {
    type Error = FailgateError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(FailgateError::InvalidPeriod(
                "Period must be at least 1 second".to_string(),
            ))
        } else if value > Self::MAX {
            Err(FailgateError::InvalidPeriod(format!(
                "Period must be at most {} seconds",
                Self::MAX
            )))
        } else {
            Ok(Self(value))
        }
    }
}

impl PeriodSeconds {
    /// Build from a [`Duration`].
    ///
    /// Sub-second remainders are truncated, so anything below one second is rejected.
    pub fn from_duration(value: Duration) -> Result<Self, FailgateError> {
        Self::try_from(value.as_secs())
    }
}

/// Maximum number of failures tolerated inside one window.
///
/// Must be between 1 and [`Quota::MAX`]. Defaults to 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quota(u64);

impl Quota {
    /// Largest accepted quota.
    ///
    /// Lua scripts handle the count as a double and Redis formats it with 14
    /// significant digits, so `quota + 1` must stay below `10^14` to reach
    /// `INCRBY` as an integer.
    pub const MAX: u64 = 1_000_000_000_000;
}

impl Default for Quota {
    /// Returns a quota of 6 failures.
    fn default() -> Self {
        Self(6)
    }
}

impl Deref for Quota {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for Quota {
    type Error = FailgateError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(FailgateError::InvalidQuota(
                "Quota must be greater than 0".to_string(),
            ))
        } else if value > Self::MAX {
            Err(FailgateError::InvalidQuota(format!(
                "Quota must be at most {}",
                Self::MAX
            )))
        } else {
            Ok(Self(value))
        }
    }
}

/// A validated namespace prepended to every caller key.
///
/// Constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix(Arc<str>);

impl Default for KeyPrefix {
    /// Returns `"limit:period:failure:"`.
    fn default() -> Self {
        Self(Arc::from("limit:period:failure:"))
    }
}

impl Deref for KeyPrefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for KeyPrefix {
    type Error = FailgateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(FailgateError::InvalidKeyPrefix(
                "Key prefix must not be empty".to_string(),
            ))
        } else if value.len() > 255 {
            Err(FailgateError::InvalidKeyPrefix(
                "Key prefix must not be longer than 255 bytes".to_string(),
            ))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<&str> for KeyPrefix {
    type Error = FailgateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

/// Outcome of a single [`crate::FailureLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The attempt succeeded. The counter was not incremented.
    Success,
    /// A failure was recorded and the count is still within quota.
    InQuota,
    /// A failure was recorded and the count now exceeds quota.
    OverQuota,
    /// The counter script answered with a code outside the protocol.
    ///
    /// [`crate::FailureLimiter`] never returns this as `Ok`; it is reported as
    /// [`FailgateError::UnknownCode`] instead.
    Unknown,
}

pub(crate) const CODE_SUCCESS: i64 = 0;
pub(crate) const CODE_IN_QUOTA: i64 = 1;
pub(crate) const CODE_OVER_QUOTA: i64 = 2;

impl Verdict {
    /// Decode a counter script result code.
    pub fn from_code(code: i64) -> Self {
        match code {
            CODE_SUCCESS => Self::Success,
            CODE_IN_QUOTA => Self::InQuota,
            CODE_OVER_QUOTA => Self::OverQuota,
            _ => Self::Unknown,
        }
    }

    /// The script result code for this verdict, `None` for [`Verdict::Unknown`].
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Success => Some(CODE_SUCCESS),
            Self::InQuota => Some(CODE_IN_QUOTA),
            Self::OverQuota => Some(CODE_OVER_QUOTA),
            Self::Unknown => None,
        }
    }

    /// `true` for [`Verdict::OverQuota`].
    pub fn is_over_quota(&self) -> bool {
        matches!(self, Self::OverQuota)
    }
}

pub(crate) const TTL_MISSING: i64 = -2;
pub(crate) const TTL_PERSISTENT: i64 = -1;

/// Time to live of a counter key, following the Redis `TTL` conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTtl {
    /// The key does not exist (raw `-2`).
    Missing,
    /// The key exists but has no expiry (raw `-1`).
    Persistent,
    /// The key expires after the given time.
    Expires(Duration),
}

impl KeyTtl {
    /// Decode a raw `TTL` reply in seconds. Returns `None` below `-2`.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            TTL_MISSING => Some(Self::Missing),
            TTL_PERSISTENT => Some(Self::Persistent),
            n => u64::try_from(n)
                .ok()
                .map(|secs| Self::Expires(Duration::from_secs(secs))),
        }
    }

    /// Encode back into the raw `TTL` convention.
    pub fn as_raw(&self) -> i64 {
        match self {
            Self::Missing => TTL_MISSING,
            Self::Persistent => TTL_PERSISTENT,
            Self::Expires(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Remaining time, if the key exists and expires.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Expires(d) => Some(*d),
            _ => None,
        }
    }
}

/// A read-only snapshot of a counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunValue {
    /// Whether the counter key currently exists.
    pub exist: bool,
    /// Current failure count, 0 if the key is absent.
    pub count: u64,
    /// Remaining time to live.
    pub ttl: KeyTtl,
}

impl RunValue {
    pub(crate) fn absent() -> Self {
        Self {
            exist: false,
            count: 0,
            ttl: KeyTtl::Missing,
        }
    }
}
