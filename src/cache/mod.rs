//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, LRU eviction and
//! single-flight loading.

mod concurrent;
mod entry;
mod flight;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use concurrent::Cache;
pub use entry::CacheEntry;
pub use flight::{Claim, LoadCoordinator, LoadTicket, LoadWaiter};
pub use lru::{NodeHandle, RecencyIndex};
pub use stats::CacheStats;
pub use store::CacheStore;
