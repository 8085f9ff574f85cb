//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// The type is `Clone` because a single load outcome is handed to every caller
/// waiting on the same key.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Invalid construction parameters; the cache is never usable
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The loader failed; the error is shared verbatim with all waiters
    #[error("Load failed: {0:#}")]
    Load(Arc<anyhow::Error>),

    /// The caller stopped waiting for an in-flight load
    #[error("Timed out after {0:?} waiting for load")]
    Timeout(Duration),
}

impl CacheError {
    /// Wraps a loader failure.
    pub fn load(err: impl Into<anyhow::Error>) -> Self {
        CacheError::Load(Arc::new(err.into()))
    }

    /// Returns the underlying loader error, if this is a load failure.
    pub fn load_error(&self) -> Option<&anyhow::Error> {
        match self {
            CacheError::Load(err) => Some(err),
            _ => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_load_error_keeps_context_chain() {
        let err: anyhow::Result<()> = Err(anyhow!("connection refused")).context("fetching user 7");
        let err = CacheError::load(err.unwrap_err());

        assert_eq!(
            err.to_string(),
            "Load failed: fetching user 7: connection refused"
        );
        assert!(err.load_error().is_some());
    }

    #[test]
    fn test_load_error_clones_share_source() {
        let err = CacheError::load(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        let cloned = err.clone();

        match (&err, &cloned) {
            (CacheError::Load(a), CacheError::Load(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected load errors"),
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CacheError::Configuration("capacity must be greater than zero".into()).to_string(),
            "Invalid configuration: capacity must be greater than zero"
        );
        assert_eq!(
            CacheError::Timeout(Duration::from_millis(50)).to_string(),
            "Timed out after 50ms waiting for load"
        );
        assert!(CacheError::Timeout(Duration::ZERO).load_error().is_none());
    }
}
