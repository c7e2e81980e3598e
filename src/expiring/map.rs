//! Expiring Map Module
//!
//! HashMap storage where every entry carries an absolute deadline. Expired
//! entries are dropped lazily by any read that finds them and, unless
//! scheduling is disabled, proactively by a per-key timer.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::clock::{duration_ms, Clock, SystemClock};
use crate::config::ExpiringMapConfig;
use crate::expiring::entry::{EntryMeta, StoredEntry};
use crate::expiring::timer::Timer;
use crate::expiring::SCHEDULE_BUFFER_MS;
use crate::stats::MapStats;

// == Shared State ==
/// Everything guarded by the map's single lock.
///
/// `timers` only ever holds keys that are also in `entries`.
#[derive(Debug)]
struct State<K, V> {
    entries: HashMap<K, StoredEntry<V>>,
    timers: HashMap<K, Timer>,
    stats: MapStats,
    next_generation: u64,
    runtime_warned: bool,
}

impl<K, V> State<K, V>
where
    K: Eq + Hash,
{
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            timers: HashMap::new(),
            stats: MapStats::new(),
            next_generation: 0,
            runtime_warned: false,
        }
    }

    // == Remove ==
    /// The one removal routine shared by delete, lazy expiry and timers.
    ///
    /// Removing an absent key is a no-op.
    fn remove<Q>(&mut self, key: &Q) -> Option<StoredEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(timer) = self.timers.remove(key) {
            timer.cancel();
        }
        let removed = self.entries.remove(key);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Live Lookup ==
    /// Returns the entry if it is still fresh at `now`, evicting it otherwise.
    fn live<Q>(&mut self, key: &Q, now: u64) -> Option<&EntryMeta<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = self.entries.get(key)?.meta.is_expired_at(now);
        if expired {
            self.remove(key);
            self.stats.record_lazy_eviction();
            trace!(now, "lazily evicted expired entry");
            return None;
        }
        self.entries.get(key).map(|entry| &entry.meta)
    }

    // == Purge Expired ==
    /// Removes all entries expired at `now`, returning how many went.
    fn purge_expired(&mut self, now: u64) -> usize
    where
        K: Clone,
    {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.meta.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
            self.stats.record_lazy_eviction();
        }
        expired.len()
    }

    /// Timer callback body: evicts `key` only if it still holds the write
    /// that armed the timer and that write is expired at `now`.
    ///
    /// Returns the time left when the timer ran ahead of the map's clock.
    fn evict_scheduled(&mut self, key: &K, generation: u64, now: u64) -> Option<u64> {
        let entry = self.entries.get(key)?;
        if entry.generation != generation {
            trace!(generation, "timer fired for superseded entry; ignoring");
            return None;
        }
        if !entry.meta.is_expired_at(now) {
            return Some(entry.meta.remaining_ms(now));
        }

        // Detach rather than abort: this is the task currently running.
        if self
            .timers
            .get(key)
            .is_some_and(|timer| timer.generation() == generation)
        {
            self.timers.remove(key);
        }
        self.remove(key);
        self.stats.record_scheduled_eviction();
        debug!(generation, "scheduled eviction removed entry");
        None
    }

    fn cancel_all_timers(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.cancel();
        }
    }
}

fn lock<K, V>(state: &Mutex<State<K, V>>) -> MutexGuard<'_, State<K, V>> {
    // No operation leaves the tables half-updated across a panic point,
    // so a poisoned lock still guards consistent data.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Expiring Map ==
/// Map whose entries become unreadable at an absolute deadline.
///
/// # Example
/// ```
/// use ephemeral_maps::{Clock, ExpiringMap, ExpiringMapConfig, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(0);
/// let map = ExpiringMap::with_clock(ExpiringMapConfig::lazy_only(), clock.clone());
///
/// map.set("a", 1, clock.now_ms() + 1_000);
/// assert_eq!(map.get("a"), Some(1));
///
/// clock.advance(Duration::from_millis(1_500));
/// assert_eq!(map.get("a"), None);
/// assert!(!map.has("a"));
/// ```
#[derive(Debug)]
pub struct ExpiringMap<K, V> {
    state: Arc<Mutex<State<K, V>>>,
    clock: Arc<dyn Clock>,
    schedule: bool,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructors ==
    /// Creates a map on the system clock with scheduling enabled.
    pub fn new() -> Self {
        Self::with_config(ExpiringMapConfig::default())
    }

    /// Creates a map on the system clock.
    pub fn with_config(config: ExpiringMapConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Creates a map reading time from `clock`.
    ///
    /// Scheduled eviction runs on tokio's timer; see [`set`](Self::set) for
    /// the runtime it needs.
    pub fn with_clock(config: ExpiringMapConfig, clock: impl Clock + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new())),
            clock: Arc::new(clock),
            schedule: !config.disable_scheduling,
        }
    }

    /// The clock used for deadlines and freshness checks.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Whether eviction timers are armed on `set`.
    pub fn is_scheduling(&self) -> bool {
        self.schedule
    }

    // == Set ==
    /// Inserts or replaces `key`, dead from `expires_at` (Unix ms) onwards.
    ///
    /// Any timer armed by a previous write of `key` is cancelled. With
    /// scheduling enabled a new one is armed for the deadline plus
    /// [`SCHEDULE_BUFFER_MS`]. When it fires it checks the map's clock and
    /// re-arms if the entry is not yet expired there.
    ///
    /// Scheduling needs an ambient tokio runtime with the time driver
    /// enabled (`enable_time`, included in `enable_all`). Without a runtime,
    /// or with one lacking timers, the entry is only reclaimed lazily.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `expires_at` - Absolute deadline in Unix milliseconds, see
    ///   [`Clock::in_seconds`] and friends
    pub fn set(&self, key: K, value: V, expires_at: u64) {
        let now = self.clock.now_ms();
        let mut state = lock(&self.state);

        let generation = state.next_generation;
        state.next_generation += 1;

        if let Some(previous) = state.timers.remove(&key) {
            previous.cancel();
        }

        let entry = StoredEntry {
            meta: EntryMeta {
                value,
                expires_at,
                added_at: now,
            },
            generation,
        };
        state.entries.insert(key.clone(), entry);
        let total = state.entries.len();
        state.stats.set_total_entries(total);

        if !self.schedule {
            return;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let scheduler = Scheduler {
                    state: Arc::downgrade(&self.state),
                    clock: Arc::clone(&self.clock),
                    runtime,
                };
                let delay_ms = expires_at
                    .saturating_sub(now)
                    .saturating_add(SCHEDULE_BUFFER_MS);
                scheduler.arm(&mut state, key, generation, delay_ms);
            }
            Err(_) if !state.runtime_warned => {
                state.runtime_warned = true;
                warn!(
                    "no tokio runtime available; expired entries will only be evicted on read"
                );
            }
            Err(_) => {}
        }
    }

    /// Inserts or replaces `key`, dead once `ttl` has elapsed.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now_ms().saturating_add(duration_ms(ttl));
        self.set(key, value, expires_at);
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// An expired entry is removed as a side effect.
    ///
    /// # Returns
    /// - `Some(value)` (a clone) if the entry exists and `now < expires_at`
    /// - `None` if the key was never set, was deleted, or has expired
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let mut state = lock(&self.state);
        let value = state.live(key, now).map(|meta| meta.value.clone());
        record_lookup(&mut state.stats, value.is_some());
        value
    }

    // == Has ==
    /// True iff [`get`](Self::get) would return a value.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let mut state = lock(&self.state);
        let present = state.live(key, now).is_some();
        record_lookup(&mut state.stats, present);
        present
    }

    // == Get Meta ==
    /// Returns the stored record without checking expiry.
    ///
    /// Meant for introspection; the value may already be past its deadline.
    pub fn get_meta<Q>(&self, key: &Q) -> Option<EntryMeta<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        lock(&self.state).entries.get(key).map(|entry| entry.meta.clone())
    }

    // == Delete ==
    /// Removes `key` and its pending timer. Returns true iff an entry was
    /// stored, expired or not.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        lock(&self.state).remove(key).is_some()
    }

    // == Clear ==
    /// Removes every entry and cancels every pending timer.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.cancel_all_timers();
        state.entries.clear();
        state.stats.set_total_entries(0);
    }

    // == Snapshots ==
    /// Keys of all unexpired entries.
    pub fn keys(&self) -> Vec<K> {
        self.snapshot(|key, _| key.clone())
    }

    /// Values of all unexpired entries.
    pub fn values(&self) -> Vec<V> {
        self.snapshot(|_, value| value.clone())
    }

    /// Key/value pairs of all unexpired entries.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.snapshot(|key, value| (key.clone(), value.clone()))
    }

    fn snapshot<T>(&self, project: impl Fn(&K, &V) -> T) -> Vec<T> {
        let now = self.clock.now_ms();
        let mut state = lock(&self.state);
        state.purge_expired(now);
        state
            .entries
            .iter()
            .map(|(key, entry)| project(key, &entry.meta.value))
            .collect()
    }

    // == Purge Expired ==
    /// Removes every expired entry in one pass. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        lock(&self.state).purge_expired(now)
    }

    // == Length ==
    /// Number of physically stored entries, including expired ones no read
    /// has discovered yet.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        lock(&self.state).entries.is_empty()
    }

    /// Number of eviction timers still pending.
    ///
    /// Timers whose task already ended without evicting (for example on a
    /// runtime built without `enable_time`) are not counted.
    pub fn pending_timers(&self) -> usize {
        lock(&self.state)
            .timers
            .values()
            .filter(|timer| !timer.is_finished())
            .count()
    }

    // == Stats ==
    /// Returns current statistics.
    pub fn stats(&self) -> MapStats {
        let state = lock(&self.state);
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }
}

impl<K, V> Default for ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for ExpiringMap<K, V> {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        for (_, timer) in state.timers.drain() {
            timer.cancel();
        }
    }
}

// == Scheduler ==
/// What a timer needs to evict or re-arm. It holds the state weakly so a
/// pending timer never keeps a dropped map's values alive.
struct Scheduler<K, V> {
    state: Weak<Mutex<State<K, V>>>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
}

impl<K, V> Clone for Scheduler<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: Weak::clone(&self.state),
            clock: Arc::clone(&self.clock),
            runtime: self.runtime.clone(),
        }
    }
}

impl<K, V> Scheduler<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Spawns the eviction timer for `key` and records it in `state`.
    fn arm(&self, state: &mut State<K, V>, key: K, generation: u64, delay_ms: u64) {
        let scheduler = self.clone();
        let timer_key = key.clone();
        let timer = Timer::spawn(
            &self.runtime,
            Duration::from_millis(delay_ms),
            generation,
            move || scheduler.fire(timer_key, generation),
        );

        // On re-arm this replaces the handle of the task now running, which
        // is dropped (detached), not aborted.
        state.timers.insert(key, timer);
        trace!(generation, delay_ms, "armed eviction timer");
    }

    /// Timer callback. The map's clock has the final say: if it does not yet
    /// consider the entry expired, the timer is armed again.
    fn fire(self, key: K, generation: u64) {
        let Some(shared) = self.state.upgrade() else {
            return;
        };
        let mut state = lock(&shared);
        let now = self.clock.now_ms();

        if let Some(remaining_ms) = state.evict_scheduled(&key, generation, now) {
            debug!(
                generation,
                remaining_ms,
                "timer ran ahead of map clock; re-arming"
            );
            let delay_ms = remaining_ms.saturating_add(SCHEDULE_BUFFER_MS);
            self.arm(&mut state, key, generation, delay_ms);
        }
    }
}

fn record_lookup(stats: &mut MapStats, hit: bool) {
    if hit {
        stats.record_hit();
    } else {
        stats.record_miss();
    }
}
