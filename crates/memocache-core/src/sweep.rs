//! Background idle-time sweeper.
//!
//! A tokio task that periodically calls [`LruCache::purge_idle`] on a cache
//! configured with an idle TTL. The task only holds a [`Weak`] reference, so
//! dropping the last `Arc` to the cache ends it on the next tick.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::lru_cache::LruCache;

/// Handle returned by [`spawn_sweeper`] to control the sweep task.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop. Takes effect without waiting for the next tick.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// True once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the sweeper task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawn the idle sweeper for `cache` on the current tokio runtime.
///
/// Returns `Ok(None)` when the cache has no idle TTL. The first pass runs
/// one TTL after spawning, then every `sweep_interval`.
///
/// # Errors
/// [`Error::Runtime`] when called outside a tokio runtime.
pub fn spawn_sweeper<K, V>(cache: &Arc<LruCache<K, V>>) -> Result<Option<SweeperHandle>>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    let Some(idle_ttl) = cache.idle_ttl() else {
        debug!("idle sweep disabled; sweeper not started");
        return Ok(None);
    };
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| Error::Runtime(format!("idle sweeper needs a tokio runtime: {e}")))?;

    let sweep_interval = cache.sweep_interval();
    let weak: Weak<LruCache<K, V>> = Arc::downgrade(cache);
    let shutdown = Arc::new(AtomicBool::new(false));
    let wake = Arc::new(Notify::new());
    let task_shutdown = Arc::clone(&shutdown);
    let task_wake = Arc::clone(&wake);

    info!(
        idle_ttl_ms = idle_ttl.as_millis() as u64,
        sweep_interval_ms = sweep_interval.as_millis() as u64,
        "idle sweeper started"
    );

    let task = runtime.spawn(async move {
        let start = tokio::time::Instant::now() + idle_ttl;
        let mut interval = tokio::time::interval_at(start, sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = task_wake.notified() => {}
            }

            if task_shutdown.load(Ordering::SeqCst) {
                info!("idle sweeper: shutdown signal received");
                break;
            }

            let Some(cache) = weak.upgrade() else {
                debug!("idle sweeper: cache dropped");
                break;
            };
            let evicted = cache.purge_idle();
            trace!(evicted, len = cache.len(), "idle sweep pass");
        }
    });

    Ok(Some(SweeperHandle {
        task,
        shutdown,
        wake,
    }))
}
