//! Mini Cache - A bounded in-process cache
//!
//! Provides LRU eviction, TTL expiration with a background janitor, and
//! single-flight loading of missing values.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
