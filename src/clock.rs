//! Clock Module
//!
//! Time sources producing absolute Unix timestamps in milliseconds, plus
//! helpers for computing deadlines.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

// == Clock Trait ==
/// Source of absolute time in Unix milliseconds.
pub trait Clock: Debug + Send + Sync {
    /// Current time in Unix milliseconds.
    fn now_ms(&self) -> u64;

    /// Deadline `secs` seconds from now.
    fn in_seconds(&self, secs: u64) -> u64 {
        self.now_ms().saturating_add(secs.saturating_mul(MS_PER_SECOND))
    }

    /// Deadline `mins` minutes from now.
    fn in_minutes(&self, mins: u64) -> u64 {
        self.now_ms().saturating_add(mins.saturating_mul(MS_PER_MINUTE))
    }

    /// Deadline `hours` hours from now.
    fn in_hours(&self, hours: u64) -> u64 {
        self.now_ms().saturating_add(hours.saturating_mul(MS_PER_HOUR))
    }

    /// Deadline `days` days from now.
    fn in_days(&self, days: u64) -> u64 {
        self.now_ms().saturating_add(days.saturating_mul(MS_PER_DAY))
    }

    /// Deadline `ttl` from now.
    fn after(&self, ttl: Duration) -> u64 {
        self.now_ms().saturating_add(duration_ms(ttl))
    }
}

// == System Clock ==
/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        current_timestamp_ms()
    }
}

// == Manual Clock ==
/// Clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the map under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Moves time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_ms(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A system clock set before the epoch reads as 0.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or(0)
}

/// Wall-clock deadline `secs` seconds from now.
pub fn in_seconds(secs: u64) -> u64 {
    SystemClock.in_seconds(secs)
}

/// Wall-clock deadline `mins` minutes from now.
pub fn in_minutes(mins: u64) -> u64 {
    SystemClock.in_minutes(mins)
}

/// Wall-clock deadline `hours` hours from now.
pub fn in_hours(hours: u64) -> u64 {
    SystemClock.in_hours(hours)
}

/// Wall-clock deadline `days` days from now.
pub fn in_days(days: u64) -> u64 {
    SystemClock.in_days(days)
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
