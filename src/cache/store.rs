//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, RecencyIndex};

// == Cache Store ==
/// Capacity-bounded storage with LRU eviction and TTL support.
///
/// The store is not synchronized; [`crate::Cache`] wraps it in a lock.
#[derive(Debug)]
pub struct CacheStore<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker
    lru: RecencyIndex<K>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl<K, V> CacheStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new CacheStore holding at most `capacity` entries.
    ///
    /// Callers validate `capacity` beforehand; see [`crate::CacheConfig::validate`].
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            lru: RecencyIndex::with_capacity(capacity),
            stats: CacheStats::new(),
            capacity,
        }
    }

    // == Put ==
    /// Stores a key-value pair with optional TTL.
    ///
    /// If the key already exists, the entry is replaced and becomes the most
    /// recently used. If the key is new and the cache is full, the least recently
    /// used entry is evicted first and its key is returned.
    pub fn put(&mut self, key: K, value: V, ttl: Option<Duration>) -> Option<K> {
        if let Some(existing) = self.entries.get_mut(&key) {
            let node = existing.node;
            *existing = CacheEntry::new(value, ttl, node);
            self.lru.touch(node);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let node = self.lru.push_front(key.clone());
        self.entries.insert(key, CacheEntry::new(value, ttl, node));
        evicted
    }

    // == Get ==
    /// Retrieves a value by key and marks it as most recently used.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let (node, expired) = match self.entries.get(key) {
            Some(entry) => (entry.node, entry.is_expired_at(now)),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.detach(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            debug!("Lazily expired entry on access");
            return None;
        }

        self.lru.touch(node);
        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Peek ==
    /// Retrieves a live value without touching recency or statistics.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.live_entry(key).map(|entry| entry.value.clone())
    }

    /// Returns true if `key` maps to a live entry.
    pub fn contains(&self, key: &K) -> bool {
        self.live_entry(key).is_some()
    }

    // == Remove ==
    /// Removes an entry by key.
    ///
    /// Returns false, without side effects, if the key is absent.
    pub fn remove(&mut self, key: &K) -> bool {
        self.detach(key).is_some()
    }

    // == Remove Expired ==
    /// Removes `key` only if its entry has expired as of `now`.
    pub fn remove_expired(&mut self, key: &K, now: Instant) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            self.detach(key);
            self.stats.record_expiration();
        }
        expired
    }

    // == Scan Expired ==
    /// Inspects at most `batch` index slots starting at `from` and collects the
    /// keys of expired entries.
    ///
    /// Returns the collected keys and the slot to resume from, or None once the
    /// end of the index has been reached.
    pub fn scan_expired(
        &self,
        from: usize,
        batch: usize,
        now: Instant,
    ) -> (Vec<K>, Option<usize>) {
        let end = from.saturating_add(batch).min(self.lru.slot_count());
        let expired = (from..end)
            .filter_map(|slot| self.lru.key_at(slot))
            .filter(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| entry.is_expired_at(now))
            })
            .cloned()
            .collect();
        let next = (end < self.lru.slot_count()).then_some(end);
        (expired, next)
    }

    /// Removes every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> {
        self.lru.iter()
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn live_entry(&self, key: &K) -> Option<&CacheEntry<V>> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
    }

    fn evict_oldest(&mut self) -> Option<K> {
        let evicted = self.lru.pop_back()?;
        self.entries.remove(&evicted);
        self.stats.record_eviction();
        debug!(len = self.entries.len(), "Evicted least recently used entry");
        Some(evicted)
    }

    /// Single removal path shared by explicit removal, lazy expiry and sweeps.
    fn detach(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(entry.node);
        Some(entry)
    }

    /// Panics if the map and the recency index disagree.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.entries.len(), self.lru.len(), "index size drifted");
        assert!(self.entries.len() <= self.capacity, "capacity exceeded");
        for (key, entry) in &self.entries {
            assert!(
                self.lru.key(entry.node) == Some(key),
                "entry handle points at another key"
            );
        }
        assert_eq!(self.lru.iter().count(), self.lru.len(), "broken links");
    }
}
