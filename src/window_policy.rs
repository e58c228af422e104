//! Expiry computation for counter windows.

use chrono::{DateTime, Local, Offset, TimeDelta, TimeZone};

use crate::PeriodSeconds;

/// Decides how many seconds a freshly created counter should live.
///
/// - **Fixed** (`align == false`): always `period`. The window starts at the
///   first failure.
/// - **Aligned** (`align == true`): the seconds left until the next boundary of
///   a `period`-second grid anchored at local midnight. Every key created in
///   the same grid cell expires at the same wall-clock instant, e.g. midnight
///   for `period = 86400`.
///
/// The result is always in `1..=period` and is meant to be installed as a TTL,
/// not added to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    period: PeriodSeconds,
    align: bool,
}

impl WindowPolicy {
    /// Create a new policy.
    pub fn new(period: PeriodSeconds, align: bool) -> Self {
        Self { period, align }
    }

    /// Window length.
    pub fn period(&self) -> PeriodSeconds {
        self.period
    }

    /// Whether windows are aligned to the local clock grid.
    pub fn is_aligned(&self) -> bool {
        self.align
    }

    /// Expiry seconds for a counter created now, on the local clock.
    pub fn expire_seconds(&self) -> u64 {
        self.expire_seconds_at(&Local::now())
    }

    /// Expiry seconds for a counter created at `now`.
    ///
    /// The offset of `now`'s time zone decides where the grid is anchored.
    pub fn expire_seconds_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> u64 {
        if !self.align {
            return *self.period;
        }

        // PeriodSeconds::MAX fits in i64.
        let period = *self.period as i64;
        let offset = i64::from(now.offset().fix().local_minus_utc());
        let adjusted = now.timestamp() + offset;

        (period - adjusted.rem_euclid(period)) as u64
    }

    /// The instant at which a counter created at `now` would reset.
    ///
    /// `None` if that instant is outside the range `chrono` can represent.
    pub fn next_reset_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let seconds = i64::try_from(self.expire_seconds_at(now)).ok()?;

        now.clone().checked_add_signed(TimeDelta::try_seconds(seconds)?)
    }
}
