//! Expiration Janitor
//!
//! Background task that periodically removes expired cache entries.

use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

// == Janitor ==
/// Owned handle to the periodic expiration sweep.
///
/// The task is aborted when the handle is dropped; [`Janitor::stop`] stops it
/// deterministically.
#[derive(Debug)]
pub struct Janitor {
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Janitor {
    /// Spawns a task on `runtime` that calls `sweep` every `interval`.
    ///
    /// `sweep` returns None once there is nothing left to sweep, which ends the
    /// task. Each tick runs as its own task so that a panicking sweep is logged
    /// and skipped instead of killing the schedule.
    pub fn start<F, Fut>(runtime: &Handle, interval: Duration, sweep: F) -> Self
    where
        F: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = usize> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = runtime.spawn(run(interval, sweep, token.clone()));

        Self {
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Returns true while the background task is alive.
    pub fn is_running(&self) -> bool {
        lock(&self.handle)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Stop ==
    /// Cancels the task and waits for it to finish, including any sweep in
    /// progress.
    pub async fn stop(&self) {
        self.token.cancel();
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "Expiration janitor ended abnormally");
                }
            }
        }
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.token.cancel();
        let slot = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run<F, Fut>(interval: Duration, mut sweep: F, token: CancellationToken)
where
    F: FnMut() -> Option<Fut> + Send + 'static,
    Fut: Future<Output = usize> + Send + 'static,
{
    info!("Starting expiration janitor with interval of {:?}", interval);

    // The first tick fires one full interval after start
    let Some(first_tick) = Instant::now().checked_add(interval) else {
        debug!("Sweep interval is beyond the clock range, janitor idle until stopped");
        token.cancelled().await;
        info!("Expiration janitor stopped");
        return;
    };
    let mut ticker = time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(pass) = sweep() else {
            debug!("Cache dropped, janitor exiting");
            break;
        };

        let mut tick = tokio::spawn(pass);
        tokio::select! {
            _ = token.cancelled() => {
                tick.abort();
                let _ = tick.await;
                break;
            }
            result = &mut tick => match result {
                Ok(0) => debug!("TTL sweep: no expired entries found"),
                Ok(removed) => info!("TTL sweep: removed {} expired entries", removed),
                Err(err) => warn!(error = %err, "TTL sweep failed, skipping tick"),
            },
        }
    }

    info!("Expiration janitor stopped");
}

// == Sweep ==
/// Removes every expired entry from `store` without holding its lock for long.
///
/// Index slots are scanned `batch` at a time under the read lock; each expired
/// key is then removed under its own write lock, yielding between removals.
/// Entries replaced after the scan are re-checked and kept.
///
/// Returns the number of entries removed.
pub async fn sweep_expired<K, V>(store: &RwLock<CacheStore<K, V>>, batch: usize) -> usize
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    let mut removed = 0;
    let mut cursor = Some(0);

    while let Some(from) = cursor {
        let (expired, next) = store.read().await.scan_expired(from, batch, Instant::now());
        for key in expired {
            let was_removed = store.write().await.remove_expired(&key, Instant::now());
            if was_removed {
                removed += 1;
            }
            task::yield_now().await;
        }
        cursor = next;
    }

    removed
}
