//! LRU (Least Recently Used) engine with abortable eviction
//!
//! Entries live in a slot arena and are linked by index into a doubly-linked
//! list ordered from most-recently used (head) to least-recently used (tail).
//! When an insertion pushes the cache over capacity, the eviction callback is
//! offered candidates starting at the tail. A vetoed candidate keeps its
//! position and the next-oldest entry is offered instead.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use ahash::RandomState;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// Eviction callback: `(key, value, access_count) -> accept`
///
/// Returning `false` vetoes the candidate. The callback runs synchronously
/// inside the call that triggered the eviction, so it must not block.
pub type EvictCallback<K, V> = Box<dyn FnMut(&K, &V, u64) -> bool + Send + Sync>;

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    /// Number of `get` promotions since insertion
    used: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed-capacity LRU cache with a veto-capable eviction callback
pub struct Lru<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    capacity: usize,
    on_evict: Option<EvictCallback<K, V>>,
}

impl<K, V> Lru<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new LRU with the given capacity and no eviction callback
    ///
    /// # Errors
    /// * `Error::InvalidCapacity` - if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self> {
        Self::build(capacity, None)
    }

    /// Create a new LRU whose evictions are offered to `on_evict` first
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of live entries
    /// * `on_evict` - Receives `(key, value, access_count)`, returns `false` to veto
    ///
    /// # Errors
    /// * `Error::InvalidCapacity` - if `capacity` is zero
    pub fn with_evict<F>(capacity: usize, on_evict: F) -> Result<Self>
    where
        F: FnMut(&K, &V, u64) -> bool + Send + Sync + 'static,
    {
        Self::build(capacity, Some(Box::new(on_evict)))
    }

    fn build(capacity: usize, on_evict: Option<EvictCallback<K, V>>) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity(capacity));
        }

        Ok(Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
            capacity,
            on_evict,
        })
    }

    /// Add a value to the cache
    ///
    /// An existing key has its value replaced and is promoted; that never
    /// evicts. A new key that overflows capacity runs one eviction round.
    ///
    /// # Returns
    /// * `bool` - Whether an entry was actually evicted
    pub fn add(&mut self, key: K, value: V) -> bool {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = &mut self.nodes[idx] {
                node.value = value;
            }
            self.move_to_front(idx);
            return false;
        }

        let idx = self.alloc_node(Node {
            key: key.clone(),
            value,
            used: 0,
            prev: None,
            next: None,
        });
        self.push_front(idx);
        self.map.insert(key, idx);

        if self.map.len() > self.capacity {
            self.evict_one()
        } else {
            false
        }
    }

    /// Look up a value, promoting it and bumping its access count
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);

        let node = self.nodes[idx].as_mut()?;
        node.used = node.used.saturating_add(1);
        Some(&node.value)
    }

    /// Look up a value without touching recency or the access count
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.node(key).map(|node| &node.value)
    }

    /// Check whether a key is present without touching recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Number of `get` promotions the entry has received since insertion
    ///
    /// This is the value handed to the eviction callback as `access_count`.
    pub fn access_count<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.node(key).map(|node| node.used)
    }

    /// Remove a key from the cache
    ///
    /// Explicit removal is not an eviction: the callback is not consulted.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.detach(idx).map(|node| node.value)
    }

    /// Remove the least-recently used entry unconditionally
    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        let idx = self.tail?;
        self.detach(idx).map(|node| (node.key, node.value))
    }

    /// Borrow the least-recently used entry
    pub fn get_oldest(&self) -> Option<(&K, &V)> {
        let idx = self.tail?;
        self.nodes[idx].as_ref().map(|node| (&node.key, &node.value))
    }

    /// Keys ordered from least- to most-recently used
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            let Some(node) = &self.nodes[idx] else {
                break;
            };
            keys.push(node.key.clone());
            cursor = node.prev;
        }
        keys
    }

    /// Change the capacity, evicting down to it if needed
    ///
    /// Each excess entry costs one eviction round. Rounds stop early once a
    /// round finds no acceptable candidate. A zero capacity is clamped to 1.
    ///
    /// # Returns
    /// * `usize` - Number of entries actually evicted
    pub fn resize(&mut self, capacity: usize) -> usize {
        let capacity = if capacity == 0 {
            warn!("Resize to 0 requested, clamping capacity to 1");
            1
        } else {
            capacity
        };
        self.capacity = capacity;

        let excess = self.map.len().saturating_sub(capacity);
        let mut evicted = 0;
        for _ in 0..excess {
            if !self.evict_one() {
                break;
            }
            evicted += 1;
        }

        debug!(capacity, evicted, len = self.map.len(), "Resized LRU");
        evicted
    }

    /// Drop every entry without consulting the callback
    pub fn purge(&mut self) {
        debug!(purged = self.map.len(), "Purging LRU");
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Get the configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// One eviction round: walk from the tail until a candidate is accepted.
    ///
    /// The callback sees each candidate before any mutation, so a panicking
    /// callback leaves the candidate untouched.
    fn evict_one(&mut self) -> bool {
        let mut cursor = self.tail;
        let mut position = 0usize;
        while let Some(idx) = cursor {
            let Some(node) = &self.nodes[idx] else {
                break;
            };
            let prev = node.prev;
            let used = node.used;

            let accept = match self.on_evict.as_mut() {
                Some(on_evict) => on_evict(&node.key, &node.value, node.used),
                None => true,
            };

            if accept {
                self.detach(idx);
                return true;
            }

            trace!(
                position,
                access_count = used,
                "Eviction vetoed, trying next-oldest entry"
            );
            position += 1;
            cursor = prev;
        }

        debug!(
            len = self.map.len(),
            capacity = self.capacity,
            "Eviction round found no acceptable candidate"
        );
        false
    }

    fn node<Q>(&self, key: &Q) -> Option<&Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.nodes[idx].as_ref()
    }

    /// Unlink a slot, drop its index entry and release it.
    fn detach(&mut self, idx: usize) -> Option<Node<K, V>> {
        self.unlink(idx);
        let node = self.free_node(idx)?;
        self.map.remove(&node.key);
        Some(node)
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = old_head;
        }

        if let Some(head_idx) = old_head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        self.unlink(idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &self.nodes[idx] {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn alloc_node(&mut self, node: Node<K, V>) -> usize {
        match self.free_list.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, idx: usize) -> Option<Node<K, V>> {
        let node = self.nodes[idx].take()?;
        self.free_list.push(idx);
        Some(node)
    }
}

impl<K, V> fmt::Debug for Lru<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lru")
            .field("len", &self.map.len())
            .field("capacity", &self.capacity)
            .field("has_evict_callback", &self.on_evict.is_some())
            .finish()
    }
}
