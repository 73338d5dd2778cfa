//! # vetolru
//!
//! Fixed-capacity, recency-ordered key/value engine whose evictions can be
//! vetoed by an external policy.
//!
//! ## Architecture
//! - **HashMap**: AHash index from key to arena slot (O(1))
//! - **LRU List**: Doubly-linked list threaded through the slot arena (O(1) unlink)
//! - **Eviction**: Candidates offered oldest-first; a veto moves on to the next-oldest
//!
//! The engine is single-threaded. `vetocache` wraps it in a reader/writer lock.
//!
//! ```
//! use vetolru::Lru;
//!
//! // Never evict the "config" entry
//! let mut lru = Lru::with_evict(2, |key: &&str, _: &u32, _| *key != "config").unwrap();
//! lru.add("config", 1);
//! lru.add("a", 2);
//! lru.add("b", 3);
//!
//! assert!(lru.contains("config"));
//! assert!(!lru.contains("a"));
//! ```

#![warn(missing_docs)]

mod error;
mod lru;

pub use error::{Error, Result};
pub use lru::{EvictCallback, Lru};
