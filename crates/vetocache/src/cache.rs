//! Cache: thread-safe wrapper around the vetolru engine
//!
//! Every mutating call (including `get`, which promotes) takes the write
//! lock; pure reads share the read lock. The eviction callback runs while the
//! write lock is held, so a slow callback stalls every other caller.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;
use vetolru::{EvictCallback, Lru, Result};

use crate::config::CacheConfig;
use crate::stats::CacheStats;

type EvictedBuffer<K, V> = Arc<Mutex<Vec<(K, V)>>>;

/// Thread-safe fixed-capacity LRU cache with vetoable evictions
pub struct Cache<K, V> {
    /// Engine state, shared for reads and exclusive for anything that reorders
    lru: RwLock<Lru<K, V>>,

    /// Pairs evicted by the most recent evicting call
    evicted: EvictedBuffer<K, V>,

    /// Cache statistics
    stats: Arc<CacheStats>,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Create a cache holding at most `capacity` entries
    ///
    /// # Errors
    /// * `Error::InvalidCapacity` - if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(CacheConfig::new(capacity), None)
    }

    /// Create a cache whose evictions can be vetoed by `on_evict`
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries
    /// * `on_evict` - Receives `(key, value, access_count)`, returns `false` to veto
    ///
    /// # Errors
    /// * `Error::InvalidCapacity` - if `capacity` is zero
    pub fn with_evict<F>(capacity: usize, on_evict: F) -> Result<Self>
    where
        F: FnMut(&K, &V, u64) -> bool + Send + Sync + 'static,
    {
        Self::with_config(CacheConfig::new(capacity), Some(Box::new(on_evict)))
    }

    /// Create a cache from an explicit configuration
    ///
    /// The cache always installs its own hook in the engine. It forwards to
    /// `on_evict` when present and records every accepted eviction in the
    /// batch buffer returned by [`Cache::evicted`].
    pub fn with_config(
        config: CacheConfig,
        mut on_evict: Option<EvictCallback<K, V>>,
    ) -> Result<Self> {
        let evicted: EvictedBuffer<K, V> = Arc::new(Mutex::new(Vec::with_capacity(
            config.evicted_buffer_capacity,
        )));
        let stats = Arc::new(CacheStats::new());

        let hook = {
            let evicted = Arc::clone(&evicted);
            let stats = Arc::clone(&stats);
            move |key: &K, value: &V, used: u64| {
                let accept = match on_evict.as_mut() {
                    Some(on_evict) => on_evict(key, value, used),
                    None => true,
                };
                if accept {
                    stats.record_eviction();
                    evicted.lock().push((key.clone(), value.clone()));
                } else {
                    stats.record_veto();
                }
                accept
            }
        };

        let lru = Lru::with_evict(config.capacity, hook)?;
        debug!(capacity = config.capacity, "Cache created");

        Ok(Self {
            lru: RwLock::new(lru),
            evicted,
            stats,
        })
    }

    /// Add a value to the cache
    ///
    /// # Returns
    /// * `bool` - Whether an entry was evicted to make room
    pub fn add(&self, key: K, value: V) -> bool {
        let mut lru = self.lru.write();
        self.evicted.lock().clear();
        lru.add(key, value)
    }

    /// Look up a value, promoting it to most-recently used
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.lru.write().get(key).cloned();
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        value
    }

    /// Look up a value without updating its recency
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lru.read().peek(key).cloned()
    }

    /// Check if a key is present without updating its recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lru.read().contains(key)
    }

    /// Add the value only if the key is absent
    ///
    /// A present key is left untouched (no value change, no promotion).
    ///
    /// # Returns
    /// * `(found, evicted)` - Whether the key was present, and whether adding evicted
    pub fn contains_or_add(&self, key: K, value: V) -> (bool, bool) {
        let mut lru = self.lru.write();
        if lru.contains(&key) {
            return (true, false);
        }

        self.evicted.lock().clear();
        (false, lru.add(key, value))
    }

    /// Return the current value if present, otherwise add `value`
    ///
    /// # Returns
    /// * `(previous, evicted)` - The existing value if found, and whether adding evicted
    pub fn peek_or_add(&self, key: K, value: V) -> (Option<V>, bool) {
        let mut lru = self.lru.write();
        if let Some(previous) = lru.peek(&key) {
            return (Some(previous.clone()), false);
        }

        self.evicted.lock().clear();
        (None, lru.add(key, value))
    }

    /// Remove a key from the cache
    ///
    /// # Returns
    /// * `bool` - Whether the key was present
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lru.write().remove(key).is_some()
    }

    /// Remove and return the least-recently used entry
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        self.lru.write().remove_oldest()
    }

    /// Return the least-recently used entry without removing it
    pub fn get_oldest(&self) -> Option<(K, V)> {
        self.lru
            .read()
            .get_oldest()
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    /// Keys ordered from oldest to newest
    pub fn keys(&self) -> Vec<K> {
        self.lru.read().keys()
    }

    /// Get current number of entries
    pub fn len(&self) -> usize {
        self.lru.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.lru.read().is_empty()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.lru.read().capacity()
    }

    /// Change the capacity, evicting down to it if needed
    ///
    /// # Returns
    /// * `usize` - Number of entries evicted
    pub fn resize(&self, capacity: usize) -> usize {
        let mut lru = self.lru.write();
        self.evicted.lock().clear();
        lru.resize(capacity)
    }

    /// Clear the cache (statistics are kept)
    pub fn purge(&self) {
        let mut lru = self.lru.write();
        lru.purge();
        self.evicted.lock().clear();
    }

    /// Pairs evicted by the most recent `add`, `contains_or_add`,
    /// `peek_or_add` or `resize`, in eviction order
    pub fn evicted(&self) -> Vec<(K, V)> {
        let _lru = self.lru.read();
        self.evicted.lock().clone()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;

    use vetolru::Error;

    #[test]
    fn test_cache_basic() {
        let cache = Cache::new(10).unwrap();

        assert!(!cache.add("key", 1));
        assert_eq!(cache.get("key"), Some(1));
        assert_eq!(cache.get("missing"), None);

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.capacity(), 10);
    }

    #[test]
    fn test_cache_invalid_capacity() {
        assert_eq!(
            Cache::<u32, u32>::new(0).err(),
            Some(Error::InvalidCapacity(0))
        );
        assert!(Cache::<u32, u32>::with_evict(0, |_, _, _| true).is_err());
    }

    #[test]
    fn test_cache_fill_past_capacity() {
        let cache = Cache::new(128).unwrap();

        for i in 0..256 {
            cache.add(i, i);
        }

        assert_eq!(cache.len(), 128);
        assert_eq!(cache.keys(), (128..256).collect::<Vec<_>>());
        assert_eq!(cache.evicted(), vec![(127, 127)]);
        for i in 0..128 {
            assert_eq!(cache.get(&i), None);
        }
        for i in 128..256 {
            assert_eq!(cache.get(&i), Some(i));
        }
        assert_eq!(cache.stats().evictions(), 128);
    }

    #[test]
    fn test_cache_eviction_batch() {
        let cache = Cache::new(4).unwrap();
        for i in 0..4 {
            cache.add(i, i * 10);
        }
        assert!(cache.evicted().is_empty());

        assert_eq!(cache.resize(1), 3);
        assert_eq!(cache.evicted(), vec![(0, 0), (1, 10), (2, 20)]);

        // Reads and explicit removals leave the batch alone
        cache.get(&3);
        cache.remove(&3);
        assert_eq!(cache.evicted().len(), 3);

        // A non-evicting add starts a fresh, empty batch
        cache.add(7, 70);
        assert!(cache.evicted().is_empty());

        cache.add(8, 80);
        assert_eq!(cache.evicted(), vec![(7, 70)]);

        cache.purge();
        assert!(cache.evicted().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_veto_tracking() {
        let cache = Cache::with_evict(2, |key: &u32, _: &&str, _| *key != 1).unwrap();

        cache.add(1, "pinned");
        cache.add(2, "b");
        assert!(cache.add(3, "c"));

        assert_eq!(cache.keys(), vec![1, 3]);
        assert_eq!(cache.evicted(), vec![(2, "b")]);
        assert_eq!(cache.stats().vetoes(), 1);
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_cache_with_config() {
        let config = CacheConfig::new(2).evicted_buffer_capacity(1);
        let cache = Cache::with_config(
            config,
            Some(Box::new(|_: &u32, _: &u32, used: u64| used == 0)),
        )
        .unwrap();

        cache.add(1, 1);
        cache.add(2, 2);
        cache.get(&1);
        cache.get(&2);
        cache.add(3, 3);

        // Both older entries were read once, so the fresh one is the victim
        assert_eq!(cache.keys(), vec![1, 2]);
        assert_eq!(cache.evicted(), vec![(3, 3)]);
        assert_eq!(cache.stats().vetoes(), 2);
    }

    #[test]
    fn test_cache_contains_or_add() {
        let cache = Cache::new(2).unwrap();
        cache.add(1, "a");
        cache.add(2, "b");

        assert_eq!(cache.contains_or_add(1, "z"), (true, false));
        assert_eq!(cache.peek(&1), Some("a"));

        // 1 was not promoted, so it goes first
        assert_eq!(cache.contains_or_add(3, "c"), (false, true));
        assert!(!cache.contains(&1));
        assert_eq!(cache.evicted(), vec![(1, "a")]);
    }

    #[test]
    fn test_cache_peek_or_add() {
        let cache = Cache::new(2).unwrap();
        cache.add(1, "a");
        cache.add(2, "b");

        assert_eq!(cache.peek_or_add(1, "z"), (Some("a"), false));
        assert_eq!(cache.peek_or_add(3, "c"), (None, true));
        assert!(!cache.contains(&1));
        assert_eq!(cache.peek(&3), Some("c"));
    }

    #[test]
    fn test_cache_remove() {
        let cache = Cache::new(4).unwrap();
        cache.add(1, 1);

        assert!(!cache.remove(&2));
        assert!(cache.remove(&1));
        assert!(!cache.remove(&1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_oldest() {
        let cache = Cache::new(3).unwrap();
        assert_eq!(cache.get_oldest(), None);

        cache.add(1, "a");
        cache.add(2, "b");
        cache.add(3, "c");
        cache.get(&1);

        assert_eq!(cache.get_oldest(), Some((2, "b")));
        assert_eq!(cache.remove_oldest(), Some((2, "b")));
        assert_eq!(cache.keys(), vec![3, 1]);
        // Explicit removal is not an eviction
        assert_eq!(cache.stats().evictions(), 0);
    }

    #[test]
    fn test_cache_resize_roundtrip() {
        let cache = Cache::new(4).unwrap();
        for i in 0..4 {
            cache.add(i, i);
        }

        assert_eq!(cache.resize(2), 2);
        assert_eq!(cache.resize(4), 0);
        assert_eq!(cache.keys(), vec![2, 3]);
        assert!(!cache.contains(&0));

        cache.add(4, 4);
        cache.add(5, 5);
        assert_eq!(cache.len(), 4);
        assert!(cache.evicted().is_empty());
    }

    #[test]
    fn test_cache_survives_panicking_callback() {
        let cache = Cache::with_evict(1, |key: &u32, _: &u32, _| {
            if *key == 1 {
                panic!("callback failure");
            }
            true
        })
        .unwrap();

        cache.add(1, 1);
        let result = panic::catch_unwind(AssertUnwindSafe(|| cache.add(2, 2)));
        assert!(result.is_err());

        // The write lock was released on unwind and the candidate kept
        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.remove(&1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_resize_panic_keeps_earlier_evictions() {
        let cache = Cache::with_evict(4, |key: &u32, _: &u32, _| {
            if *key == 2 {
                panic!("callback failure");
            }
            true
        })
        .unwrap();
        for i in 0..4 {
            cache.add(i, i);
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| cache.resize(1)));
        assert!(result.is_err());

        assert_eq!(cache.keys(), vec![2, 3]);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.evicted(), vec![(0, 0), (1, 1)]);
        assert_eq!(cache.stats().evictions(), 2);
    }

    #[test]
    fn test_cache_concurrent_access() {
        let cache = Cache::new(64).unwrap();

        thread::scope(|s| {
            for t in 0..8u64 {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..1000u64 {
                        let key = t * 1000 + i;
                        cache.add(key, key);
                        if let Some(value) = cache.get(&key) {
                            assert_eq!(value, key);
                        }
                        cache.peek(&key);
                        assert!(cache.len() <= 64);
                    }
                });
            }
        });

        assert_eq!(cache.len(), 64);
        assert_eq!(cache.stats().evictions(), 8000 - 64);
    }
}
