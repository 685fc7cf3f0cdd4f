//! memocache-core: bounded, thread-safe LRU cache
//!
//! A fixed-capacity key-value cache with least-recently-used eviction,
//! O(1) lookup/insert/update, and an optional background sweep that drops
//! entries idle for longer than a configured TTL.
//!
//! # Architecture
//!
//! ```text
//! key ──► Index (HashMap) ──► arena slot ──► value cell (Mutex<V>)
//!                                 │
//!                     Recency List (head = MRU … tail = LRU)
//!                                 ▲
//!              idle sweeper (tokio task, tail → head)
//! ```
//!
//! # Modules
//!
//! - `lru_cache`: the cache engine and the `CacheStore` trait
//! - `sweep`: background idle-time sweeper
//! - `config`: `memocache.toml` loading and validation
//! - `logging`: tracing subscriber setup
//! - `error`: error types with remediation guidance
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod lru_cache;
pub mod sweep;

pub use config::{CacheConfig, Config};
pub use error::{ConfigError, Error, Result};
pub use lru_cache::{CacheStats, CacheStore, LruCache};
pub use sweep::{SweeperHandle, spawn_sweeper};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
