//! Ephemeral Maps - In-memory maps with bounded entry lifetimes
//!
//! - [`ExpiringMap`]: entries die at an absolute deadline, checked on every
//!   read and optionally reclaimed by per-key tokio timers.
//! - [`WeakRefMap`]: entries die when the last strong `Arc` to the value
//!   elsewhere is dropped.

pub mod clock;
pub mod config;
pub mod error;
pub mod expiring;
pub mod stats;
pub mod weak;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ExpiringMapConfig;
pub use error::{Error, Result};
pub use expiring::{spawn_purge_task, EntryMeta, ExpiringMap, SCHEDULE_BUFFER_MS};
pub use stats::MapStats;
pub use weak::WeakRefMap;
