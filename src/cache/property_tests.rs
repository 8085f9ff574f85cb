//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against a simple reference model.

use proptest::prelude::*;
use std::collections::VecDeque;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::CacheStore;

// == Strategies ==
/// Keys are drawn from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = u8> {
    0u8..12
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: u8, value: u32 },
    Get { key: u8 },
    Remove { key: u8 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), any::<u32>()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
    ]
}

// == Reference Model ==
/// Naive LRU: front = most recently used.
struct Model {
    capacity: usize,
    order: VecDeque<(u8, u32)>,
}

impl Model {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
        }
    }

    fn position(&self, key: u8) -> Option<usize> {
        self.order.iter().position(|(k, _)| *k == key)
    }

    fn put(&mut self, key: u8, value: u32) -> Option<u8> {
        if let Some(pos) = self.position(key) {
            self.order.remove(pos);
            self.order.push_front((key, value));
            return None;
        }
        let evicted = if self.order.len() >= self.capacity {
            self.order.pop_back().map(|(k, _)| k)
        } else {
            None
        };
        self.order.push_front((key, value));
        evicted
    }

    fn get(&mut self, key: u8) -> Option<u32> {
        let pos = self.position(key)?;
        let entry = self.order.remove(pos)?;
        self.order.push_front(entry);
        Some(entry.1)
    }

    fn remove(&mut self, key: u8) -> bool {
        match self.position(key) {
            Some(pos) => self.order.remove(pos).is_some(),
            None => false,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Every operation agrees with the reference model, and the map and the
    // recency index stay in sync.
    #[test]
    fn prop_matches_reference_model(
        capacity in 1usize..6,
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let mut store = CacheStore::new(capacity);
        let mut model = Model::new(capacity);

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    prop_assert_eq!(store.put(key, value, None), model.put(key, value));
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(store.get(&key), model.get(key));
                }
                CacheOp::Remove { key } => {
                    prop_assert_eq!(store.remove(&key), model.remove(key));
                }
            }
            store.assert_consistent();
        }

        let expected: Vec<u8> = model.order.iter().map(|(k, _)| *k).collect();
        let actual: Vec<u8> = store.keys_by_recency().copied().collect();
        prop_assert_eq!(actual, expected);
    }

    // The number of entries never exceeds capacity.
    #[test]
    fn prop_capacity_enforcement(
        capacity in 1usize..20,
        entries in prop::collection::vec((any::<u16>(), any::<u32>()), 1..200)
    ) {
        let mut store = CacheStore::new(capacity);

        for (key, value) in entries {
            store.put(key, value, None);
            prop_assert!(
                store.len() <= capacity,
                "Cache size {} exceeds max {}",
                store.len(),
                capacity
            );
        }
    }

    // Statistics reflect the observed hits and misses.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let mut store = CacheStore::new(8);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    store.put(key, value, None);
                }
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Remove { key } => {
                    store.remove(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, store.len());
    }

    // Removing an absent key reports false and leaves the store unchanged.
    #[test]
    fn prop_remove_absent_is_noop(
        keys in prop::collection::vec(0u8..50, 0..30),
        absent in 50u8..100
    ) {
        let mut store = CacheStore::new(64);
        for key in &keys {
            store.put(*key, u32::from(*key), None);
        }
        let before: Vec<u8> = store.keys_by_recency().copied().collect();

        prop_assert!(!store.remove(&absent));
        prop_assert_eq!(store.keys_by_recency().copied().collect::<Vec<_>>(), before);
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // Expired entries are invisible on access and can be swept in any batch size.
    #[test]
    fn prop_expired_entries_are_reclaimed(
        ttls in prop::collection::vec(prop::option::of(Just(Duration::from_millis(5))), 1..20),
        batch in 1usize..8
    ) {
        let mut store = CacheStore::new(32);
        for (key, ttl) in ttls.iter().enumerate() {
            store.put(key, key, *ttl);
        }
        let expiring = ttls.iter().filter(|ttl| ttl.is_some()).count();

        sleep(Duration::from_millis(10));

        let now = tokio::time::Instant::now();
        let mut cursor = Some(0);
        let mut expired = Vec::new();
        while let Some(from) = cursor {
            let (keys, next) = store.scan_expired(from, batch, now);
            expired.extend(keys);
            cursor = next;
        }
        prop_assert_eq!(expired.len(), expiring);

        for key in &expired {
            prop_assert!(store.remove_expired(key, now));
        }
        prop_assert_eq!(store.len(), ttls.len() - expiring);
        store.assert_consistent();
    }
}
