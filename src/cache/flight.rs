//! Load Coordinator Module
//!
//! Deduplicates concurrent misses so that at most one load per key is in flight.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::warn;

use crate::cache::CacheStats;
use crate::error::{CacheError, Result};

/// Resolution of a load, None until the loader has finished.
type Outcome<V> = Option<Result<V>>;

struct Ticket<V> {
    /// Distinguishes successive tickets for the same key
    id: u64,
    outcome: watch::Receiver<Outcome<V>>,
}

// == Claim ==
/// Result of asking the coordinator to load a key.
pub enum Claim<K: Hash + Eq, V> {
    /// No load was in flight; the holder must run the loader and resolve the ticket.
    Leader(LoadTicket<K, V>),
    /// Another caller is already loading the key.
    Follower(LoadWaiter<V>),
}

// == Load Coordinator ==
/// Table of in-flight loads, keyed like the store.
///
/// The table has its own sharded locks and is never touched while the store
/// lock is held.
pub struct LoadCoordinator<K, V> {
    tickets: Arc<DashMap<K, Ticket<V>>>,
    next_id: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
    coalesced: AtomicU64,
}

impl<K, V> Default for LoadCoordinator<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LoadCoordinator<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    // == Claim ==
    /// Atomically joins the in-flight load for `key` or registers a new one.
    pub fn claim(&self, key: &K) -> Claim<K, V> {
        match self.tickets.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                Claim::Follower(LoadWaiter {
                    outcome: occupied.get().outcome.clone(),
                })
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (sender, outcome) = watch::channel(None);
                vacant.insert(Ticket { id, outcome });
                Claim::Leader(LoadTicket {
                    key: key.clone(),
                    id,
                    sender,
                    tickets: Arc::clone(&self.tickets),
                })
            }
        }
    }

    /// Returns true while a load for `key` is in flight.
    pub fn is_loading(&self, key: &K) -> bool {
        self.tickets.contains_key(key)
    }

    /// Number of loads currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tickets.len()
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the loader counters into `stats`.
    pub fn fill_stats(&self, stats: &mut CacheStats) {
        stats.loads = self.loads.load(Ordering::Relaxed);
        stats.load_failures = self.failures.load(Ordering::Relaxed);
        stats.coalesced = self.coalesced.load(Ordering::Relaxed);
    }
}

// == Load Ticket ==
/// Exclusive right to resolve the in-flight load of one key.
///
/// Resolving consumes the ticket. A ticket dropped unresolved (for example
/// when the loader panics) is still retired, and its waiters receive a load
/// error instead of hanging.
pub struct LoadTicket<K: Hash + Eq, V> {
    key: K,
    id: u64,
    sender: watch::Sender<Outcome<V>>,
    tickets: Arc<DashMap<K, Ticket<V>>>,
}

impl<K: Hash + Eq, V> LoadTicket<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Creates a waiter for this ticket's outcome.
    pub fn waiter(&self) -> LoadWaiter<V> {
        LoadWaiter {
            outcome: self.sender.subscribe(),
        }
    }

    // == Resolve ==
    /// Retires the ticket, then hands `outcome` to every waiter.
    ///
    /// Retiring first means a caller arriving after resolution starts a fresh
    /// load rather than joining a finished one.
    pub fn resolve(self, outcome: Result<V>) {
        self.retire();
        self.sender.send_replace(Some(outcome));
    }

    fn retire(&self) {
        self.tickets.remove_if(&self.key, |_, ticket| ticket.id == self.id);
    }
}

impl<K: Hash + Eq, V> Drop for LoadTicket<K, V> {
    fn drop(&mut self) {
        if self.sender.borrow().is_none() {
            warn!(ticket = self.id, "In-flight load abandoned before resolving");
        }
        self.retire();
    }
}

// == Load Waiter ==
/// Handle for awaiting the outcome of an in-flight load.
pub struct LoadWaiter<V> {
    outcome: watch::Receiver<Outcome<V>>,
}

impl<V: Clone> LoadWaiter<V> {
    /// Waits for the load to resolve, giving up after `timeout` if one is set.
    ///
    /// Giving up never cancels the load itself.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<V> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.resolved())
                .await
                .map_err(|_| CacheError::Timeout(limit))?,
            None => self.resolved().await,
        }
    }

    async fn resolved(&mut self) -> Result<V> {
        match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => match &*outcome {
                Some(result) => result.clone(),
                None => Err(abandoned()),
            },
            Err(_) => Err(abandoned()),
        }
    }
}

fn abandoned() -> CacheError {
    CacheError::load(anyhow!("load was abandoned before it resolved"))
}
