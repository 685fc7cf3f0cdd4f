//! Bounded, thread-safe LRU (Least Recently Used) cache with O(1) operations.
//!
//! Uses a HashMap for key→index lookup and an arena-based doubly-linked list
//! for recency ordering. No unsafe code: nodes live in a `Vec<Node>` with
//! index-based links instead of raw pointers.
//!
//! # Locking
//!
//! Two independent primitives protect the cache:
//!
//! - the **structural lock**, one `RwLock` per cache, guards the index, the
//!   list links, head/tail, timestamps and statistics;
//! - a **value cell**, one `Mutex<V>` per live node, guards the cached value.
//!
//! The two are never held at the same time. Updating the value of an
//! existing key writes through its cell without holding the structural lock;
//! the recency promotion that follows takes the structural lock on its own.
//!
//! When a full cache admits a new key, the tail node's slot is recycled in
//! place and receives a fresh value cell. A writer still holding the old
//! cell lands its write on the evicted entry, as if it had happened just
//! before the eviction.
//!
//! # Example
//! ```
//! use memocache_core::lru_cache::LruCache;
//!
//! let cache = LruCache::new(3).unwrap();
//! cache.add_or_update(1, "one");
//! cache.add_or_update(2, "two");
//! cache.add_or_update(3, "three");
//!
//! assert_eq!(cache.try_get_value(&1), Some("one"));
//! // 1 is now most-recently used, 2 is least-recently used
//!
//! cache.add_or_update(4, "four"); // evicts key=2 (LRU)
//! assert_eq!(cache.try_get_value(&2), None);
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::{Error, Result};

/// Sentinel value for null links in the doubly-linked list.
const SENTINEL: usize = usize::MAX;

/// Shared, independently locked storage for one node's value.
type ValueCell<V> = Arc<Mutex<V>>;

fn lock_cell<V>(cell: &ValueCell<V>) -> MutexGuard<'_, V> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A node in the arena-based doubly-linked list.
///
/// `value` is `None` only while the slot sits on the free list.
#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: Option<ValueCell<V>>,
    last_accessed: Instant,
    prev: usize,
    next: usize,
}

/// Cache hit/miss/eviction statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub updates: u64,
    /// Tail evictions caused by admitting a new key into a full cache.
    pub evictions: u64,
    /// Entries removed by the idle-time sweep.
    pub expirations: u64,
}

impl CacheStats {
    /// Hit rate as a fraction [0.0, 1.0]. Returns 0.0 if no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of lookups (hits + misses).
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Minimal read/write surface shared by cache implementations.
pub trait CacheStore<K, V> {
    /// Insert `value` under `key`, replacing any existing value.
    fn add_or_update(&self, key: K, value: V);

    /// Look up `key`, counting the lookup as a use.
    fn try_get_value(&self, key: &K) -> Option<V>;
}

/// Everything guarded by the structural lock.
struct Inner<K, V> {
    /// Key → arena index mapping.
    map: HashMap<K, usize>,
    /// Arena of nodes.
    arena: Vec<Node<K, V>>,
    /// Index of most-recently used node (head of list).
    head: usize,
    /// Index of least-recently used node (tail of list).
    tail: usize,
    /// Free-list head for slots released by the idle sweep.
    free_head: usize,
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V> Inner<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            arena: Vec::with_capacity(capacity),
            head: SENTINEL,
            tail: SENTINEL,
            free_head: SENTINEL,
            stats: CacheStats::default(),
        }
    }

    fn cell_of(&self, key: &K) -> Option<ValueCell<V>> {
        self.map
            .get(key)
            .and_then(|&idx| self.arena[idx].value.clone())
    }

    /// Admit an absent key, recycling the tail slot when the cache is full.
    fn admit(&mut self, key: K, value: V, capacity: usize, now: Instant) {
        if self.map.len() >= capacity && self.tail != SENTINEL {
            let idx = self.tail;
            let old_key = std::mem::replace(&mut self.arena[idx].key, key.clone());
            self.map.remove(&old_key);
            self.arena[idx].value = Some(Arc::new(Mutex::new(value)));
            self.arena[idx].last_accessed = now;
            self.map.insert(key, idx);
            self.move_to_head(idx);
            self.stats.evictions += 1;
            self.stats.insertions += 1;
            trace!(slot = idx, "lru tail recycled for new key");
            return;
        }

        let idx = self.alloc_slot(key.clone(), value, now);
        self.push_head(idx);
        self.map.insert(key, idx);
        self.stats.insertions += 1;
    }

    /// Promote `key` after a value update, provided it still owns `cell`.
    fn promote_updated(&mut self, key: &K, cell: &ValueCell<V>, now: Instant) {
        self.stats.updates += 1;
        let Some(&idx) = self.map.get(key) else {
            return;
        };
        let owns_cell = self.arena[idx]
            .value
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, cell));
        if owns_cell {
            self.arena[idx].last_accessed = now;
            self.move_to_head(idx);
        }
    }

    // --- Internal linked-list operations ---

    /// Allocate a slot in the arena, reusing a free slot if available.
    fn alloc_slot(&mut self, key: K, value: V, now: Instant) -> usize {
        let node = Node {
            key,
            value: Some(Arc::new(Mutex::new(value))),
            last_accessed: now,
            prev: SENTINEL,
            next: SENTINEL,
        };
        if self.free_head != SENTINEL {
            let idx = self.free_head;
            self.free_head = self.arena[idx].next;
            self.arena[idx] = node;
            idx
        } else {
            self.arena.push(node);
            self.arena.len() - 1
        }
    }

    /// Remove node at `idx` from the doubly-linked list (does NOT free the slot).
    fn unlink(&mut self, idx: usize) {
        let prev = self.arena[idx].prev;
        let next = self.arena[idx].next;

        if prev != SENTINEL {
            self.arena[prev].next = next;
        } else {
            self.head = next;
        }

        if next != SENTINEL {
            self.arena[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.arena[idx].prev = SENTINEL;
        self.arena[idx].next = SENTINEL;
    }

    /// Push node at `idx` to the head of the list (most-recently used).
    fn push_head(&mut self, idx: usize) {
        self.arena[idx].prev = SENTINEL;
        self.arena[idx].next = self.head;

        if self.head != SENTINEL {
            self.arena[self.head].prev = idx;
        }
        self.head = idx;

        if self.tail == SENTINEL {
            self.tail = idx;
        }
    }

    /// Move an existing node to the head (most-recently used).
    fn move_to_head(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_head(idx);
    }

    /// Unlink, unindex and free the node at `idx`.
    fn release(&mut self, idx: usize) {
        self.unlink(idx);
        self.map.remove(&self.arena[idx].key);
        self.arena[idx].value = None;
        self.arena[idx].next = self.free_head;
        self.free_head = idx;
    }

    fn keys_from(&self, start: usize, forward: bool) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut current = start;
        while current != SENTINEL && keys.len() < self.map.len() {
            let node = &self.arena[current];
            keys.push(node.key.clone());
            current = if forward { node.next } else { node.prev };
        }
        keys
    }

    fn check_invariants(&self) -> std::result::Result<(), String> {
        let count = self.map.len();
        if (self.head == SENTINEL) != (count == 0) || (self.tail == SENTINEL) != (count == 0) {
            return Err(format!(
                "head/tail nullness disagrees with count {count} (head={}, tail={})",
                self.head, self.tail
            ));
        }

        let mut seen = vec![false; self.arena.len()];
        let mut forward = Vec::with_capacity(count);
        let mut prev = SENTINEL;
        let mut current = self.head;
        while current != SENTINEL {
            if current >= self.arena.len() {
                return Err(format!("link to out-of-range slot {current}"));
            }
            if seen[current] {
                return Err(format!("slot {current} appears twice in the list"));
            }
            seen[current] = true;
            let node = &self.arena[current];
            if node.prev != prev {
                return Err(format!(
                    "slot {current} has prev {} but was reached from {prev}",
                    node.prev
                ));
            }
            if node.value.is_none() {
                return Err(format!("slot {current} is linked but has no value cell"));
            }
            match self.map.get(&node.key) {
                Some(&idx) if idx == current => {}
                _ => return Err(format!("slot {current} key is not indexed to itself")),
            }
            forward.push(current);
            prev = current;
            current = node.next;
        }

        if prev != self.tail {
            return Err(format!(
                "forward walk ended at {prev} but tail is {}",
                self.tail
            ));
        }
        if forward.len() != count {
            return Err(format!(
                "list holds {} nodes but index holds {count}",
                forward.len()
            ));
        }

        let mut backward = Vec::with_capacity(count);
        let mut current = self.tail;
        while current != SENTINEL && backward.len() <= count {
            backward.push(current);
            current = self.arena[current].prev;
        }
        backward.reverse();
        if backward != forward {
            return Err("backward walk is not the reverse of the forward walk".to_string());
        }
        Ok(())
    }
}

/// Bounded, thread-safe LRU cache with O(1) operations.
///
/// All methods take `&self`; share the cache between threads with
/// `Arc<LruCache<K, V>>`. The linked list maintains recency order:
/// head = most recent, tail = least recent.
pub struct LruCache<K, V> {
    /// Maximum number of entries.
    capacity: usize,
    /// Idle threshold for the sweep; `None` disables it.
    idle_ttl: Option<Duration>,
    /// Period between background sweeps.
    sweep_interval: Duration,
    inner: RwLock<Inner<K, V>>,
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &inner.map.len())
            .field("idle_ttl", &self.idle_ttl)
            .field("stats", &inner.stats)
            .finish()
    }
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Create a new LRU cache with the given maximum capacity and no idle sweep.
    ///
    /// Fails with [`Error::InvalidCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::build(capacity, None, CacheConfig::default().sweep_interval())
    }

    /// Create a cache from a validated [`CacheConfig`].
    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Self::build(config.capacity, config.idle_ttl(), config.sweep_interval())
    }

    fn build(capacity: usize, idle_ttl: Option<Duration>, sweep_interval: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            idle_ttl: idle_ttl.filter(|ttl| !ttl.is_zero()),
            sweep_interval,
            inner: RwLock::new(Inner::with_capacity(capacity)),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner<K, V>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<K, V>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the maximum capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of entries currently stored.
    pub fn len(&self) -> usize {
        self.read().map.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.read().map.is_empty()
    }

    /// Returns true once the cache holds `capacity` entries.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Idle threshold used by the sweep, if enabled.
    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }

    /// Period between background sweep passes.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.read().stats.clone()
    }

    /// Resets the statistics counters.
    pub fn reset_stats(&self) {
        self.write().stats = CacheStats::default();
    }

    /// Insert or update a key-value pair.
    ///
    /// An existing key has its value replaced under the node's own lock and is
    /// then promoted to most-recently used. An absent key is admitted at the
    /// head; if the cache is full the least-recently used entry is evicted and
    /// its slot reused.
    pub fn add_or_update(&self, key: K, value: V) {
        let existing = self.read().cell_of(&key);
        if let Some(cell) = existing {
            self.update_existing(&key, &cell, value);
            return;
        }

        let mut inner = self.write();
        // Another caller may have admitted the key since the read check.
        let raced = inner.cell_of(&key);
        if let Some(cell) = raced {
            drop(inner);
            self.update_existing(&key, &cell, value);
            return;
        }
        inner.admit(key, value, self.capacity, Instant::now());
    }

    fn update_existing(&self, key: &K, cell: &ValueCell<V>, value: V) {
        *lock_cell(cell) = value;
        self.write().promote_updated(key, cell, Instant::now());
    }

    /// Returns true if the cache contains the given key (without promoting it).
    pub fn contains_key(&self, key: &K) -> bool {
        self.read().map.contains_key(key)
    }

    /// Keys from most-recently used to least-recently used.
    pub fn keys_mru(&self) -> Vec<K> {
        let inner = self.read();
        inner.keys_from(inner.head, true)
    }

    /// Keys from least-recently used to most-recently used.
    pub fn keys_lru(&self) -> Vec<K> {
        let inner = self.read();
        inner.keys_from(inner.tail, false)
    }

    /// Run one idle-time sweep pass using the current time.
    pub fn purge_idle(&self) -> usize {
        self.purge_idle_at(Instant::now())
    }

    /// Run one idle-time sweep pass as of `now`.
    ///
    /// Walks from the tail toward the head, evicting every entry idle for
    /// longer than the configured threshold, and stops at the first entry
    /// that is still fresh. Returns the number of evicted entries; always 0
    /// when the sweep is disabled.
    pub fn purge_idle_at(&self, now: Instant) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };

        let mut inner = self.write();
        let mut evicted = 0usize;
        let mut current = inner.tail;
        while current != SENTINEL {
            let idle = now.saturating_duration_since(inner.arena[current].last_accessed);
            if idle <= ttl {
                break;
            }
            let prev = inner.arena[current].prev;
            inner.release(current);
            evicted += 1;
            current = prev;
        }

        if evicted > 0 {
            inner.stats.expirations += evicted as u64;
            debug!(
                evicted,
                remaining = inner.map.len(),
                idle_ttl_ms = ttl.as_millis() as u64,
                "idle sweep evicted entries"
            );
        }
        evicted
    }

    /// Verify the structural invariants of the index and recency list.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let inner = self.read();
        if inner.map.len() > self.capacity {
            return Err(format!(
                "len {} exceeds capacity {}",
                inner.map.len(),
                self.capacity
            ));
        }
        inner.check_invariants()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    /// Get a clone of the value for `key`, promoting it to most-recently used.
    /// Returns `None` if the key is not present.
    pub fn try_get_value(&self, key: &K) -> Option<V> {
        let cell = {
            let mut inner = self.write();
            let found = inner.map.get(key).copied();
            let Some(idx) = found else {
                inner.stats.misses += 1;
                return None;
            };
            inner.arena[idx].last_accessed = Instant::now();
            inner.move_to_head(idx);
            inner.stats.hits += 1;
            inner.arena[idx].value.clone()
        };
        cell.map(|cell| lock_cell(&cell).clone())
    }

    /// Peek at the value for `key` without promoting it (no recency change).
    pub fn peek(&self, key: &K) -> Option<V> {
        let cell = self.read().cell_of(key);
        cell.map(|cell| lock_cell(&cell).clone())
    }
}

impl<K: Hash + Eq + Clone, V: Clone> CacheStore<K, V> for LruCache<K, V> {
    fn add_or_update(&self, key: K, value: V) {
        LruCache::add_or_update(self, key, value);
    }

    fn try_get_value(&self, key: &K) -> Option<V> {
        LruCache::try_get_value(self, key)
    }
}
