//! Expiring Map Module
//!
//! Deadline-bounded key-value storage with lazy and scheduled eviction.

mod entry;
mod map;
mod purge;
mod timer;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::EntryMeta;
pub use map::ExpiringMap;
pub use purge::spawn_purge_task;

// == Public Constants ==
/// Delay added after a deadline before the eviction timer fires, so the
/// timer can never run ahead of logical expiry.
pub const SCHEDULE_BUFFER_MS: u64 = 1000;
