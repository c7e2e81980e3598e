//! Expiring Entry Module
//!
//! Stored record for one key of an [`ExpiringMap`](super::ExpiringMap).

use chrono::{DateTime, Utc};

// == Entry Meta ==
/// A stored value together with its deadline and insertion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta<V> {
    /// The stored value
    pub value: V,
    /// Deadline (Unix milliseconds); the entry is dead once `now >= expires_at`
    pub expires_at: u64,
    /// Insertion timestamp (Unix milliseconds)
    pub added_at: u64,
}

impl<V> EntryMeta<V> {
    // == Is Expired ==
    /// Checks whether the entry is dead at `now_ms`.
    ///
    /// The deadline instant itself counts as expired.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Time To Live ==
    /// Milliseconds left before the deadline, 0 once expired.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }

    /// Deadline as a UTC datetime, `None` if out of chrono's range.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        to_utc(self.expires_at)
    }

    /// Insertion time as a UTC datetime, `None` if out of chrono's range.
    pub fn added_at_utc(&self) -> Option<DateTime<Utc>> {
        to_utc(self.added_at)
    }
}

fn to_utc(ms: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(i64::try_from(ms).ok()?)
}

// == Stored Entry ==
/// Entry plus the generation that wrote it; timers compare generations so
/// they never evict a newer write of the same key.
#[derive(Debug)]
pub(crate) struct StoredEntry<V> {
    pub(crate) meta: EntryMeta<V>,
    pub(crate) generation: u64,
}
