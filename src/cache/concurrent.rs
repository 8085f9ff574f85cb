//! Concurrent Cache Module
//!
//! Public cache handle composing the store, the load coordinator and the
//! expiration janitor.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::flight::{Claim, LoadCoordinator, LoadTicket};
use crate::cache::{CacheStats, CacheStore};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{sweep_expired, Janitor};

// == Cache ==
/// Bounded concurrent cache with LRU eviction, TTL expiration and
/// single-flight loading.
///
/// All methods take `&self`; share the cache between tasks with an `Arc`.
/// The store sits behind one read/write lock. In-flight loads are tracked in a
/// separate table so a slow loader never blocks operations on other keys.
///
/// # Example
/// ```no_run
/// # async fn demo() -> mini_cache::Result<()> {
/// use std::time::Duration;
/// use mini_cache::Cache;
///
/// let cache: Cache<String, u64> = Cache::new(1024, Duration::from_secs(1))?;
/// cache.put("answer".to_string(), 42, None).await;
///
/// let value = cache
///     .get_or_load(
///         "slow".to_string(),
///         || async { Ok::<_, anyhow::Error>(7) },
///         Some(Duration::from_secs(60)),
///         None,
///     )
///     .await?;
/// assert_eq!(value, 7);
/// # Ok(())
/// # }
/// ```
pub struct Cache<K, V> {
    store: Arc<RwLock<CacheStore<K, V>>>,
    loads: Arc<LoadCoordinator<K, V>>,
    capacity: usize,
    sweep_batch: usize,
    default_ttl: Option<Duration>,
    janitor: Janitor,
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .field("janitor", &self.janitor)
            .finish_non_exhaustive()
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries and sweeping expired
    /// entries every `sweep_interval`.
    ///
    /// Must be called from within a Tokio runtime, which runs the janitor.
    pub fn new(capacity: usize, sweep_interval: Duration) -> Result<Self> {
        Self::with_config(CacheConfig::new(capacity, sweep_interval))
    }

    /// Creates a cache from a full configuration.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| {
            CacheError::Configuration("a Tokio runtime is required to run the janitor".to_string())
        })?;

        let store = Arc::new(RwLock::new(CacheStore::new(config.capacity)));
        let weak = Arc::downgrade(&store);
        let batch = config.sweep_batch;
        let janitor = Janitor::start(&runtime, config.sweep_interval, move || {
            let store = weak.upgrade()?;
            Some(async move { sweep_expired(&store, batch).await })
        });

        debug!(
            capacity = config.capacity,
            sweep_interval = ?config.sweep_interval,
            "Cache created"
        );

        Ok(Self {
            store,
            loads: Arc::new(LoadCoordinator::new()),
            capacity: config.capacity,
            sweep_batch: batch,
            default_ttl: config.default_ttl,
            janitor,
        })
    }

    // == Get ==
    /// Returns a clone of the value for `key` and marks it most recently used.
    ///
    /// Expired entries are removed and reported as absent.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.store.write().await.get(key)
    }

    // == Put ==
    /// Inserts or replaces the value for `key`.
    ///
    /// Without a `ttl` the configured default applies; with neither, the entry
    /// never expires. Inserting a new key into a full cache evicts the least
    /// recently used entry.
    pub async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let ttl = self.effective_ttl(ttl);
        self.store.write().await.put(key, value, ttl);
    }

    // == Get Or Load ==
    /// Returns the cached value for `key`, running `loader` on a miss.
    ///
    /// Concurrent misses for the same key share a single loader invocation and
    /// all receive its outcome. A failed load is reported to every waiter and
    /// is not cached. The loader runs on its own task: a caller that gives up
    /// after `timeout` gets [`CacheError::Timeout`] while the load carries on
    /// and still populates the cache.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        key: K,
        loader: F,
        ttl: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let waiter = match self.loads.claim(&key) {
            Claim::Follower(waiter) => {
                debug!("Joined in-flight load");
                waiter
            }
            Claim::Leader(ticket) => {
                let waiter = ticket.waiter();
                tokio::spawn(run_load(
                    Arc::clone(&self.store),
                    Arc::clone(&self.loads),
                    ticket,
                    loader,
                    self.effective_ttl(ttl),
                ));
                waiter
            }
        };

        waiter.wait(timeout).await
    }

    // == Remove ==
    /// Removes `key`, returning false if it was not present.
    pub async fn remove(&self, key: &K) -> bool {
        self.store.write().await.remove(key)
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet reclaimed.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Returns true if `key` holds a live entry. Does not affect recency.
    pub async fn contains(&self, key: &K) -> bool {
        self.store.read().await.contains(key)
    }

    /// Returns the value for `key` without marking it as used.
    pub async fn peek(&self, key: &K) -> Option<V> {
        self.store.read().await.peek(key)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes every entry. In-flight loads still install their results.
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Runs one expiration sweep now and returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        sweep_expired(&self.store, self.sweep_batch).await
    }

    // == Stats ==
    /// Returns a snapshot of cache and loader statistics.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.store.read().await.stats();
        self.loads.fill_stats(&mut stats);
        stats
    }

    /// Stops the background janitor and waits for it to finish.
    ///
    /// The cache stays usable; expired entries are then only reclaimed on access.
    pub async fn shutdown(&self) {
        self.janitor.stop().await;
    }

    /// Returns true while the background janitor is running.
    pub fn janitor_running(&self) -> bool {
        self.janitor.is_running()
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.default_ttl)
    }
}

/// Runs a claimed load to completion and resolves its ticket.
async fn run_load<K, V, F, Fut, E>(
    store: Arc<RwLock<CacheStore<K, V>>>,
    loads: Arc<LoadCoordinator<K, V>>,
    ticket: LoadTicket<K, V>,
    loader: F,
    ttl: Option<Duration>,
) where
    K: Hash + Eq + Clone,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<V, E>>,
    E: Into<anyhow::Error>,
{
    // Another caller may have stored the key between our miss and the claim
    let cached = store.read().await.peek(ticket.key());
    if let Some(value) = cached {
        ticket.resolve(Ok(value));
        return;
    }

    loads.record_load();
    debug!("Running loader");
    let outcome = match loader().await {
        Ok(value) => {
            store
                .write()
                .await
                .put(ticket.key().clone(), value.clone(), ttl);
            Ok(value)
        }
        Err(err) => {
            loads.record_failure();
            let err = CacheError::load(err);
            warn!(error = %err, "Loader failed");
            Err(err)
        }
    };
    ticket.resolve(outcome);
}
