//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

use crate::cache::lru::NodeHandle;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Entries are never mutated in place: replacing a key builds a new entry
/// that reuses the old recency node.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
    /// Position of this entry in the recency index
    pub(crate) node: NodeHandle,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// A TTL too large to be represented as an instant means "no expiration".
    pub(crate) fn new(value: V, ttl: Option<Duration>, node: NodeHandle) -> Self {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));

        Self {
            value,
            expires_at,
            node,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Checks expiry against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}
