//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of a cache.
//!
//! # Tasks
//! - Expiration janitor: removes expired cache entries at configured intervals

mod janitor;

pub use janitor::{sweep_expired, Janitor};
