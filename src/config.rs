//! Configuration Module
//!
//! Handles loading and validating cache configuration.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Interval between background expiration sweeps
    pub sweep_interval: Duration,
    /// Number of index slots a sweep inspects per lock acquisition
    pub sweep_batch: usize,
    /// TTL applied to entries stored without an explicit TTL, None = never expire
    pub default_ttl: Option<Duration>,
}

impl CacheConfig {
    /// Creates a configuration with the given capacity and sweep interval.
    pub fn new(capacity: usize, sweep_interval: Duration) -> Self {
        Self {
            capacity,
            sweep_interval,
            ..Self::default()
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep frequency in milliseconds (default: 1000)
    /// - `CACHE_SWEEP_BATCH` - Slots inspected per sweep batch (default: 256)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: none)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env_parse("CACHE_CAPACITY").unwrap_or(defaults.capacity),
            sweep_interval: env_parse("CACHE_SWEEP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            sweep_batch: env_parse("CACHE_SWEEP_BATCH").unwrap_or(defaults.sweep_batch),
            default_ttl: env_parse("CACHE_DEFAULT_TTL_MS")
                .map(Duration::from_millis)
                .or(defaults.default_ttl),
        }
    }

    /// Sets the number of slots inspected per sweep batch.
    pub fn with_sweep_batch(mut self, sweep_batch: usize) -> Self {
        self.sweep_batch = sweep_batch;
        self
    }

    /// Sets the TTL used by `put` calls that don't pass one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    // == Validate ==
    /// Rejects parameters the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::Configuration(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::Configuration(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        if self.sweep_batch == 0 {
            return Err(CacheError::Configuration(
                "sweep batch must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            sweep_interval: Duration::from_secs(1),
            sweep_batch: 256,
            default_ttl: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
