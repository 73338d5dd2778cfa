//! # vetocache
//!
//! Thread-safe LRU cache whose evictions can be vetoed.
//!
//! ## Architecture
//! - **Engine**: [`vetolru::Lru`] behind a `parking_lot::RwLock`
//! - **Locking**: shared lock for pure reads, exclusive lock for anything
//!   that mutates or reorders (`get` included)
//! - **Eviction batch**: pairs evicted by the last evicting call, see [`Cache::evicted`]
//! - **Statistics**: hit/miss/eviction/veto counters
//!
//! The eviction callback runs while the exclusive lock is held. A callback
//! that blocks stalls every other caller of the same cache.
//!
//! ```
//! use vetocache::Cache;
//!
//! let cache = Cache::with_evict(2, |_: &u32, value: &&str, _| !value.starts_with("pinned")).unwrap();
//! cache.add(1, "pinned:root");
//! cache.add(2, "leaf");
//! cache.add(3, "leaf");
//!
//! assert_eq!(cache.keys(), vec![1, 3]);
//! assert_eq!(cache.evicted(), vec![(2, "leaf")]);
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod stats;

pub use cache::Cache;
pub use config::{CacheConfig, DEFAULT_EVICTED_BUFFER_SIZE};
pub use stats::{CacheStats, StatsSnapshot};
pub use vetolru::{Error, EvictCallback, Result};
