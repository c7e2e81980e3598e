//! Weak Reference Map Module
//!
//! Map that observes `Arc`-owned values without keeping them alive.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::stats::MapStats;

// == Weak Ref Map ==
/// Map from keys to weakly held values.
///
/// A key is present only while some other owner still holds a strong
/// `Arc` to its value. Dead entries are dropped whenever a read finds them;
/// there is no background reclamation.
///
/// # Example
/// ```
/// use ephemeral_maps::WeakRefMap;
/// use std::sync::Arc;
///
/// let mut map = WeakRefMap::new();
/// let session = Arc::new("alice".to_string());
///
/// map.set("s1", &session);
/// assert_eq!(map.get("s1").as_deref(), Some(&"alice".to_string()));
///
/// drop(session);
/// assert!(map.get("s1").is_none());
/// ```
#[derive(Debug)]
pub struct WeakRefMap<K, V: ?Sized> {
    entries: HashMap<K, Weak<V>>,
    stats: MapStats,
}

impl<K, V> WeakRefMap<K, V>
where
    K: Eq + Hash + Clone,
    V: ?Sized,
{
    // == Constructor ==
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: MapStats::new(),
        }
    }

    // == Set ==
    /// Records a weak observation of `value` under `key`, replacing any
    /// previous one. The strong count of `value` is left untouched.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - Handle to the value; the caller keeps ownership
    pub fn set(&mut self, key: K, value: &Arc<V>) {
        self.entries.insert(key, Arc::downgrade(value));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns a strong handle if the value is still alive.
    ///
    /// A dead observation is removed as a side effect.
    ///
    /// # Returns
    /// - `Some(handle)` while another owner keeps the value alive
    /// - `None` if the key was never set, was deleted, or its value is gone
    pub fn get<Q>(&mut self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.resolve(key);
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        value
    }

    // == Has ==
    /// True iff [`get`](Self::get) would return a value.
    pub fn has<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    // == Delete ==
    /// Removes `key`. Returns true iff an observation was stored, dead or not.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Clear ==
    /// Removes every observation.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Snapshots ==
    /// Keys whose values are still alive.
    pub fn keys(&mut self) -> Vec<K> {
        self.live().into_iter().map(|(key, _)| key).collect()
    }

    /// Strong handles to every live value.
    pub fn values(&mut self) -> Vec<Arc<V>> {
        self.live().into_iter().map(|(_, value)| value).collect()
    }

    /// Key/handle pairs for every live value.
    pub fn entries(&mut self) -> Vec<(K, Arc<V>)> {
        self.live()
    }

    // == Purge Dead ==
    /// Drops every observation whose value is gone. Returns the number removed.
    pub fn purge_dead(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        let removed = before - self.entries.len();

        self.stats.lazy_evictions += removed as u64;
        self.stats.set_total_entries(self.entries.len());
        if removed > 0 {
            trace!(removed, "purged dead weak observations");
        }
        removed
    }

    // == Length ==
    /// Number of stored observations, including dead ones not yet discovered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Stats ==
    /// Returns current statistics.
    pub fn stats(&self) -> MapStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Upgrades the observation under `key`, removing it if dead.
    fn resolve<Q>(&mut self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.entries.get(key)?.upgrade();
        if value.is_none() {
            self.entries.remove(key);
            self.stats.record_lazy_eviction();
            self.stats.set_total_entries(self.entries.len());
            trace!("lazily evicted dead weak observation");
        }
        value
    }

    /// Upgrades every observation, dropping the dead ones.
    fn live(&mut self) -> Vec<(K, Arc<V>)> {
        self.purge_dead();
        self.entries
            .iter()
            .filter_map(|(key, weak)| weak.upgrade().map(|value| (key.clone(), value)))
            .collect()
    }
}

impl<K, V> Default for WeakRefMap<K, V>
where
    K: Eq + Hash + Clone,
    V: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}
