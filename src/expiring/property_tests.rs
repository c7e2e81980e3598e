//! Property-Based Tests for the Expiring Map
//!
//! Runs random operation sequences against a plain HashMap model on a
//! manual clock.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use crate::clock::{Clock, ManualClock};
use crate::config::ExpiringMapConfig;
use crate::expiring::ExpiringMap;

// == Strategies ==
/// Small key space so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum MapOp {
    Set { key: String, value: i32, ttl_ms: u64 },
    Get { key: String },
    Delete { key: String },
    Advance { ms: u64 },
    Clear,
}

fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        4 => (key_strategy(), any::<i32>(), 0u64..3_000)
            .prop_map(|(key, value, ttl_ms)| MapOp::Set { key, value, ttl_ms }),
        3 => key_strategy().prop_map(|key| MapOp::Get { key }),
        1 => key_strategy().prop_map(|key| MapOp::Delete { key }),
        2 => (0u64..2_000).prop_map(|ms| MapOp::Advance { ms }),
        1 => Just(MapOp::Clear),
    ]
}

fn lazy_map() -> (ManualClock, ExpiringMap<String, i32>) {
    let clock = ManualClock::new(0);
    let map = ExpiringMap::with_clock(ExpiringMapConfig::lazy_only(), clock.clone());
    (clock, map)
}

/// Model view: live entries only.
fn live(model: &HashMap<String, (i32, u64)>, now: u64) -> HashMap<String, i32> {
    model
        .iter()
        .filter(|(_, (_, expires_at))| now < *expires_at)
        .map(|(key, (value, _))| (key.clone(), *value))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Reads never observe an expired value and always agree with the model.
    #[test]
    fn prop_reads_match_model(ops in prop::collection::vec(map_op_strategy(), 1..60)) {
        let (clock, map) = lazy_map();
        let mut model: HashMap<String, (i32, u64)> = HashMap::new();

        for op in ops {
            match op {
                MapOp::Set { key, value, ttl_ms } => {
                    let expires_at = clock.now_ms() + ttl_ms;
                    map.set(key.clone(), value, expires_at);
                    model.insert(key, (value, expires_at));
                }
                MapOp::Get { key } => {
                    let expected = live(&model, clock.now_ms()).get(&key).copied();
                    prop_assert_eq!(map.get(&key), expected);
                    prop_assert_eq!(map.has(&key), expected.is_some());
                }
                MapOp::Delete { key } => {
                    // delete reports physical presence, which lazy eviction may
                    // already have cleared, so only check it never lies about live keys
                    let was_live = live(&model, clock.now_ms()).contains_key(&key);
                    let deleted = map.delete(&key);
                    prop_assert!(!was_live || deleted, "Live key {} not deleted", key);
                    prop_assert!(!map.delete(&key), "Second delete of {} succeeded", key);
                    model.remove(&key);
                }
                MapOp::Advance { ms } => clock.advance(Duration::from_millis(ms)),
                MapOp::Clear => {
                    map.clear();
                    model.clear();
                }
            }
        }

        let expected = live(&model, clock.now_ms());
        let mut keys = map.keys();
        keys.sort();
        let mut expected_keys: Vec<String> = expected.keys().cloned().collect();
        expected_keys.sort();
        prop_assert_eq!(keys, expected_keys);

        let actual: HashMap<String, i32> = map.entries().into_iter().collect();
        prop_assert_eq!(actual, expected);
        prop_assert_eq!(map.len(), map.keys().len(), "Snapshot left expired entries behind");
    }

    // A refresh before the first deadline keeps the key alive past it.
    #[test]
    fn prop_refresh_extends_lifetime(
        key in key_strategy(),
        first_ttl in 1u64..5_000,
        extra in 1u64..5_000,
        refresh_at in 0u64..5_000,
    ) {
        prop_assume!(refresh_at < first_ttl);
        let (clock, map) = lazy_map();

        map.set(key.clone(), 1, first_ttl);
        clock.set(refresh_at);
        map.set(key.clone(), 2, first_ttl + extra);

        clock.set(first_ttl);
        prop_assert_eq!(map.get(&key), Some(2));

        clock.set(first_ttl + extra);
        prop_assert_eq!(map.get(&key), None);
    }
}
