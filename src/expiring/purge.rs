//! Expired Entry Purge Task
//!
//! Background task that periodically sweeps expired entries out of an
//! [`ExpiringMap`]. Useful for maps built with scheduling disabled, where
//! unread expired entries would otherwise stay resident.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::expiring::ExpiringMap;

/// Spawns a background task that calls [`ExpiringMap::purge_expired`] every
/// `interval`.
///
/// The task only holds a weak reference and stops by itself once the map
/// is dropped; the returned handle can also be aborted.
///
/// # Arguments
/// * `map` - Shared map to sweep; only a weak reference is kept
/// * `interval` - Time between purge runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let map = Arc::new(ExpiringMap::with_config(ExpiringMapConfig::lazy_only()));
/// let purge_handle = spawn_purge_task(&map, Duration::from_secs(1));
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task<K, V>(map: &Arc<ExpiringMap<K, V>>, interval: Duration) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let map = Arc::downgrade(map);

    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting expired entry purge task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(map) = map.upgrade() else {
                debug!("Map dropped, stopping purge task");
                break;
            };

            let removed = map.purge_expired();
            if removed > 0 {
                info!("Purge: removed {} expired entries", removed);
            } else {
                debug!("Purge: no expired entries found");
            }
        }
    })
}
