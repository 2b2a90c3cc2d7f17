//! Least Recently Used (LRU) Store
//!
//! A capacity-bounded string key/value store with O(1) `get` and `put` and
//! strict recency-ordered eviction. Every cache node owns exactly one store.
//!
//! # Algorithm
//!
//! Entries live in an intrusive doubly linked [`RecencyList`] that owns their
//! storage, most recently used at the head. A hash map indexes each key to its
//! list node. A hit moves the node to the head; inserting a new key into a full
//! store first pops the tail, so exactly one entry is evicted per such `put`.
//!
//! # Thread Safety
//!
//! The state sits behind a [`parking_lot::RwLock`]. `get` promotes the entry it
//! finds, so it takes the write lock just like `put`. The diagnostic reads
//! ([`peek`](LruStore::peek), [`contains`](LruStore::contains),
//! [`len`](LruStore::len), [`snapshot`](LruStore::snapshot)) leave recency
//! untouched and share the read lock. The lock is scoped to one store; two
//! stores never block each other.

use crate::list::{Node, RecencyList};
use crate::metrics::{CacheMetrics, StoreMetrics};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;
#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

type Slot = *mut Node<(String, String)>;

/// Unsynchronized store state: recency list, key index and counters.
///
/// # Safety
///
/// Every pointer in `index` was returned by `order.push_front` and is removed
/// from `index` before its node leaves `order`, so indexed pointers always
/// refer to live value nodes owned by `order`.
struct StoreState {
    capacity: NonZeroUsize,
    order: RecencyList<(String, String)>,
    index: HashMap<String, Slot, DefaultHashBuilder>,
    metrics: StoreMetrics,
}

// SAFETY: StoreState owns every node its pointers refer to; moving it to another
// thread moves the whole structure together.
unsafe impl Send for StoreState {}

// SAFETY: all mutation goes through `&mut self`, which the surrounding RwLock
// hands out exclusively. Shared access only reads.
unsafe impl Sync for StoreState {}

impl StoreState {
    fn new(capacity: NonZeroUsize) -> Self {
        StoreState {
            capacity,
            order: RecencyList::new(),
            index: HashMap::with_capacity_and_hasher(
                capacity.get(),
                DefaultHashBuilder::default(),
            ),
            metrics: StoreMetrics::default(),
        }
    }

    fn get(&mut self, key: &str) -> Option<&String> {
        match self.index.get(key).copied() {
            Some(node) => {
                self.metrics.record_hit();
                // SAFETY: indexed pointers are live value nodes of `order`.
                unsafe {
                    self.order.move_to_front(node);
                    Some(&(*node).value().1)
                }
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    fn put(&mut self, key: String, value: String) -> Option<(String, String)> {
        if let Some(node) = self.index.get(&key).copied() {
            // SAFETY: indexed pointers are live value nodes of `order`.
            unsafe {
                self.order.move_to_front(node);
                (*node).value_mut().1 = value;
            }
            self.metrics.record_update();
            return None;
        }

        let mut evicted = None;
        if self.index.len() >= self.capacity.get() {
            if let Some((old_key, old_value)) = self.order.pop_back() {
                self.index.remove(&old_key);
                self.metrics.record_eviction();
                evicted = Some((old_key, old_value));
            }
        }

        let node = self.order.push_front((key.clone(), value));
        self.index.insert(key, node);
        self.metrics.record_insertion();

        debug_assert_eq!(self.index.len(), self.order.len());
        evicted
    }

    fn peek(&self, key: &str) -> Option<&String> {
        let node = self.index.get(key).copied()?;
        // SAFETY: indexed pointers are live value nodes of `order`.
        unsafe { Some(&(*node).value().1) }
    }
}

/// A thread-safe, capacity-bounded LRU store of string keys and values.
///
/// # Examples
///
/// ```
/// use shard_cache::LruStore;
/// use std::num::NonZeroUsize;
///
/// let store = LruStore::new(NonZeroUsize::new(2).unwrap());
/// store.put("apple".to_string(), "red".to_string());
/// store.put("banana".to_string(), "yellow".to_string());
///
/// // reading "apple" makes "banana" the least recently used entry
/// assert_eq!(store.get("apple"), Some("red".to_string()));
///
/// let evicted = store.put("cherry".to_string(), "dark red".to_string());
/// assert_eq!(evicted, Some(("banana".to_string(), "yellow".to_string())));
/// assert_eq!(store.get("banana"), None);
/// ```
pub struct LruStore {
    capacity: NonZeroUsize,
    state: RwLock<StoreState>,
}

impl LruStore {
    /// Creates an empty store holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        LruStore {
            capacity,
            state: RwLock::new(StoreState::new(capacity)),
        }
    }

    /// Rebuilds a store from a [`snapshot`](LruStore::snapshot).
    ///
    /// `entries` are expected most recently used first, which is the order
    /// `snapshot` produces, so the recency order survives the round trip. If
    /// there are more entries than `capacity`, the least recently used ones are
    /// dropped. When a key repeats, its most recent occurrence wins. Counters
    /// start from zero.
    pub fn restore<I>(capacity: NonZeroUsize, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let entries: Vec<_> = entries.into_iter().collect();
        let mut state = StoreState::new(capacity);
        for (key, value) in entries.into_iter().rev() {
            state.put(key, value);
        }
        state.metrics = StoreMetrics::default();

        LruStore {
            capacity,
            state: RwLock::new(state),
        }
    }

    /// Maximum number of entries this store holds.
    #[inline]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Looks up `key` and promotes it to most recently used.
    ///
    /// Returns `None` on a miss; a miss leaves the resident set and its order
    /// unchanged.
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.write().get(key).cloned()
    }

    /// Inserts or updates `key` and makes it the most recently used entry.
    ///
    /// Returns the evicted entry when a new key had to displace the least
    /// recently used one. Updating an existing key never evicts.
    pub fn put(&self, key: String, value: String) -> Option<(String, String)> {
        self.state.write().put(key, value)
    }

    /// Reads `key` without touching its recency.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.state.read().peek(key).cloned()
    }

    /// Returns `true` if `key` is resident, without touching its recency.
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().index.contains_key(key)
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.state.read().order.is_empty()
    }

    /// Copies all entries, most recently used first.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.state.read().order.iter().cloned().collect()
    }

    /// Copies the resident keys, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.state
            .read()
            .order
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns a copy of the request and mutation counters.
    pub fn store_metrics(&self) -> StoreMetrics {
        self.state.read().metrics.clone()
    }
}

impl CacheMetrics for LruStore {
    fn metrics(&self) -> BTreeMap<String, f64> {
        let state = self.state.read();
        let mut metrics = state.metrics.to_btreemap();
        let entries = state.index.len();
        metrics.insert("entries".to_string(), entries as f64);
        metrics.insert("capacity".to_string(), self.capacity.get() as f64);
        metrics.insert(
            "utilization".to_string(),
            entries as f64 / self.capacity.get() as f64,
        );
        metrics
    }

    fn component_name(&self) -> &'static str {
        "LruStore"
    }
}

impl fmt::Debug for LruStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStore")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
