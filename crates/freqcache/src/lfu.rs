//! LFU (Least Frequently Used) cache with least-recently-used tie-breaking
//!
//! Entries live in an arena of slots. Every usage count present in the cache
//! owns a doubly-linked list of the slots at that count, newest touch at the
//! head. Eviction takes the tail of the lowest-count list, which is the least
//! recently touched entry among those with the minimum count.

use std::collections::{btree_map, BTreeMap, HashMap};
use std::hash::Hash;

use ahash::RandomState;

use crate::error::{Error, Result};

/// Slot in the arena
struct Node<K, V> {
    key: K,
    value: V,
    count: u64,
    /// Neighbour touched more recently, same count
    prev: Option<usize>,
    /// Neighbour touched less recently, same count
    next: Option<usize>,
}

/// Ends of the recency list for one usage count
#[derive(Debug, Clone, Copy)]
struct Bucket {
    head: usize,
    tail: usize,
}

/// Bounded cache evicting the least frequently used entry.
///
/// Lookups are O(1); insertion and eviction are O(log F) where F is the
/// number of distinct usage counts currently held.
///
/// The cache itself is not synchronized. Use [`SharedCache`](crate::SharedCache)
/// to share one instance between threads.
pub struct BoundedFrequencyCache<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    buckets: BTreeMap<u64, Bucket>,
    free_list: Vec<usize>,
    capacity: usize,
}

impl<K, V> BoundedFrequencyCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new cache holding at most `capacity` entries
    ///
    /// # Errors
    /// * [`Error::ZeroCapacity`] if `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }

        Ok(Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            nodes: Vec::with_capacity(capacity),
            buckets: BTreeMap::new(),
            free_list: Vec::new(),
            capacity,
        })
    }

    /// Return the value stored for `key`, computing and storing it on a miss
    ///
    /// A hit counts one more use of the entry and marks it most recently used.
    /// On a miss `compute` runs exactly once; if it fails, its error is
    /// returned untouched and the cache is left as it was.
    pub fn get_or_compute<F, E>(&mut self, key: K, compute: F) -> std::result::Result<&V, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
    {
        let idx = match self.map.get(&key) {
            Some(&idx) => {
                self.touch(idx);
                idx
            }
            None => {
                let value = compute()?;
                self.insert_new(key, value).0
            }
        };

        Ok(&self.entry(idx).value)
    }

    /// Get a value, counting a use
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        Some(&self.entry(idx).value)
    }

    /// Get a value without counting a use or changing recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|&idx| &self.entry(idx).value)
    }

    /// Number of times `key` has been presented since it was inserted
    pub fn usage_count(&self, key: &K) -> Option<u64> {
        self.map.get(key).map(|&idx| self.entry(idx).count)
    }

    /// Store a precomputed value
    ///
    /// An existing entry gets the new value and is counted as used. A new
    /// entry may evict one other entry, which is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.map.get(&key) {
            self.entry_mut(idx).value = value;
            self.touch(idx);
            None
        } else {
            self.insert_new(key, value).1
        }
    }

    /// Remove a key from the cache
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.free_list.push(idx);
        self.nodes[idx].take().map(|node| node.value)
    }

    /// Key the next eviction would select
    pub fn victim(&self) -> Option<&K> {
        self.buckets
            .values()
            .next()
            .map(|bucket| &self.entry(bucket.tail).key)
    }

    /// Iterate keys and usage counts in eviction order
    pub fn keys_by_priority(&self) -> KeysByPriority<'_, K, V> {
        KeysByPriority {
            cache: self,
            buckets: self.buckets.values(),
            cursor: None,
        }
    }

    /// Check whether `key` is cached
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Get the current size of the cache
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.buckets.clear();
        self.free_list.clear();
    }

    /// Insert a key known to be absent, evicting first if full
    fn insert_new(&mut self, key: K, value: V) -> (usize, Option<(K, V)>) {
        let evicted = if self.map.len() >= self.capacity {
            self.evict()
        } else {
            None
        };

        let idx = self.alloc_node();
        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            count: 1,
            prev: None,
            next: None,
        });
        self.link_front(idx);
        self.map.insert(key, idx);

        (idx, evicted)
    }

    fn touch(&mut self, idx: usize) {
        self.unlink(idx);
        let node = self.entry_mut(idx);
        node.count = node.count.saturating_add(1);
        self.link_front(idx);
    }

    fn evict(&mut self) -> Option<(K, V)> {
        let tail = self.buckets.values().next()?.tail;
        self.unlink(tail);
        let node = self.nodes[tail].take()?;
        self.map.remove(&node.key);
        self.free_list.push(tail);
        Some((node.key, node.value))
    }

    /// Put a detached slot at the head of the list for its count
    fn link_front(&mut self, idx: usize) {
        let count = self.entry(idx).count;
        let old_head = match self.buckets.entry(count) {
            btree_map::Entry::Occupied(mut bucket) => {
                let head = bucket.get().head;
                bucket.get_mut().head = idx;
                Some(head)
            }
            btree_map::Entry::Vacant(slot) => {
                slot.insert(Bucket { head: idx, tail: idx });
                None
            }
        };

        if let Some(head) = old_head {
            self.entry_mut(head).prev = Some(idx);
        }
        let node = self.entry_mut(idx);
        node.prev = None;
        node.next = old_head;
    }

    /// Detach a slot from the list for its count, dropping the list if emptied
    fn unlink(&mut self, idx: usize) {
        let (prev, next, count) = {
            let node = self.entry(idx);
            (node.prev, node.next, node.count)
        };

        if let Some(prev_idx) = prev {
            self.entry_mut(prev_idx).next = next;
        }
        if let Some(next_idx) = next {
            self.entry_mut(next_idx).prev = prev;
        }

        match (prev, next) {
            (None, None) => {
                self.buckets.remove(&count);
            }
            (None, Some(next_idx)) => {
                if let Some(bucket) = self.buckets.get_mut(&count) {
                    bucket.head = next_idx;
                }
            }
            (Some(prev_idx), None) => {
                if let Some(bucket) = self.buckets.get_mut(&count) {
                    bucket.tail = prev_idx;
                }
            }
            (Some(_), Some(_)) => {}
        }

        let node = self.entry_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn entry(&self, idx: usize) -> &Node<K, V> {
        match &self.nodes[idx] {
            Some(node) => node,
            None => unreachable!("slot {idx} is linked but empty"),
        }
    }

    fn entry_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        match &mut self.nodes[idx] {
            Some(node) => node,
            None => unreachable!("slot {idx} is linked but empty"),
        }
    }
}

/// Iterator over `(key, usage_count)` from the next eviction victim onwards.
///
/// Created by [`BoundedFrequencyCache::keys_by_priority`].
pub struct KeysByPriority<'a, K, V> {
    cache: &'a BoundedFrequencyCache<K, V>,
    buckets: btree_map::Values<'a, u64, Bucket>,
    cursor: Option<usize>,
}

impl<'a, K, V> Iterator for KeysByPriority<'a, K, V>
where
    K: Hash + Eq + Clone,
{
    type Item = (&'a K, u64);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(idx) = self.cursor {
                let node = self.cache.entry(idx);
                self.cursor = node.prev;
                return Some((&node.key, node.count));
            }
            self.cursor = Some(self.buckets.next()?.tail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ok<V>(value: V) -> impl FnOnce() -> std::result::Result<V, ()> {
        move || Ok(value)
    }

    fn live(cache: &BoundedFrequencyCache<&'static str, u32>) -> Vec<(&'static str, u64)> {
        let mut keys: Vec<_> = cache.keys_by_priority().map(|(k, c)| (*k, c)).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = BoundedFrequencyCache::<u32, u32>::new(0);
        assert_eq!(result.err(), Some(Error::ZeroCapacity));
    }

    #[test]
    fn test_hit_skips_compute() {
        let mut cache = BoundedFrequencyCache::new(2).unwrap();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(String::from("body"))
        };

        assert_eq!(cache.get_or_compute(1, compute).unwrap(), "body");
        assert_eq!(cache.get_or_compute(1, compute).unwrap(), "body");
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.usage_count(&1), Some(2));
    }

    #[test]
    fn test_usage_count_tracks_presentations() {
        let mut cache = BoundedFrequencyCache::new(4).unwrap();

        for _ in 0..5 {
            cache.get_or_compute("a", ok(1)).unwrap();
        }
        cache.get_or_compute("b", ok(2)).unwrap();
        cache.get(&"b");

        assert_eq!(cache.usage_count(&"a"), Some(5));
        assert_eq!(cache.usage_count(&"b"), Some(2));
        assert_eq!(cache.usage_count(&"c"), None);
    }

    #[test]
    fn test_evicts_lowest_count() {
        let mut cache = BoundedFrequencyCache::new(3).unwrap();

        cache.get_or_compute("A", ok(1)).unwrap();
        cache.get_or_compute("B", ok(2)).unwrap();
        cache.get_or_compute("C", ok(3)).unwrap();
        cache.get_or_compute("A", ok(0)).unwrap();
        cache.get_or_compute("A", ok(0)).unwrap();
        cache.get_or_compute("B", ok(0)).unwrap();

        assert_eq!(cache.victim(), Some(&"C"));
        cache.get_or_compute("D", ok(4)).unwrap();

        assert_eq!(live(&cache), vec![("A", 3), ("B", 2), ("D", 1)]);
        assert_eq!(cache.peek(&"A"), Some(&1));
    }

    #[test]
    fn test_tie_evicts_least_recent() {
        let mut cache = BoundedFrequencyCache::new(2).unwrap();

        cache.get_or_compute("A", ok(1)).unwrap();
        cache.get_or_compute("B", ok(2)).unwrap();
        cache.get_or_compute("C", ok(3)).unwrap();

        assert_eq!(live(&cache), vec![("B", 1), ("C", 1)]);
    }

    #[test]
    fn test_tie_break_follows_last_touch() {
        let mut cache = BoundedFrequencyCache::new(3).unwrap();

        cache.get_or_compute("A", ok(1)).unwrap();
        cache.get_or_compute("B", ok(2)).unwrap();
        cache.get_or_compute("C", ok(3)).unwrap();
        // A and B both reach 2; B is touched after A
        cache.get(&"A");
        cache.get(&"B");
        cache.get(&"C");
        cache.get(&"C");

        let order: Vec<_> = cache.keys_by_priority().collect();
        assert_eq!(order, vec![(&"A", 2), (&"B", 2), (&"C", 3)]);

        let evicted = cache.insert("D", 4);
        assert_eq!(evicted, Some(("A", 1)));
    }

    #[test]
    fn test_failed_compute_leaves_state() {
        let mut cache = BoundedFrequencyCache::new(2).unwrap();
        cache.get_or_compute("A", ok(1)).unwrap();
        cache.get_or_compute("B", ok(2)).unwrap();

        let err = cache
            .get_or_compute("C", || Err::<u32, _>("boom"))
            .unwrap_err();
        assert_eq!(err, "boom");
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&"A"));
        assert!(cache.contains(&"B"));
        assert_eq!(cache.usage_count(&"A"), Some(1));

        let calls = Cell::new(0);
        cache
            .get_or_compute("C", || {
                calls.set(calls.get() + 1);
                Ok::<_, &str>(3)
            })
            .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_hit_ignores_failing_compute() {
        let mut cache = BoundedFrequencyCache::new(1).unwrap();
        cache.get_or_compute(7, ok("seven")).unwrap();

        let value = cache.get_or_compute(7, || Err("never called")).unwrap();
        assert_eq!(*value, "seven");
    }

    #[test]
    fn test_insert_overwrite_counts_use() {
        let mut cache = BoundedFrequencyCache::new(2).unwrap();

        assert_eq!(cache.insert(1, "a"), None);
        assert_eq!(cache.insert(1, "b"), None);

        assert_eq!(cache.peek(&1), Some(&"b"));
        assert_eq!(cache.usage_count(&1), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_peek_does_not_touch() {
        let mut cache = BoundedFrequencyCache::new(2).unwrap();
        cache.insert(1, "a");
        cache.insert(2, "b");

        assert_eq!(cache.peek(&1), Some(&"a"));
        assert_eq!(cache.usage_count(&1), Some(1));
        assert_eq!(cache.insert(3, "c"), Some((1, "a")));
    }

    #[test]
    fn test_remove_and_reuse_slot() {
        let mut cache = BoundedFrequencyCache::new(3).unwrap();
        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.insert(3, "c");

        assert_eq!(cache.remove(&2), Some("b"));
        assert_eq!(cache.remove(&2), None);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.insert(4, "d"), None);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.nodes.len(), 3);
        assert_eq!(cache.victim(), Some(&1));
    }

    #[test]
    fn test_clear() {
        let mut cache = BoundedFrequencyCache::new(3).unwrap();
        cache.insert(1, "a");
        cache.get(&1);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.victim(), None);
        assert_eq!(cache.keys_by_priority().count(), 0);

        cache.insert(2, "b");
        assert_eq!(cache.usage_count(&2), Some(1));
    }

    #[test]
    fn test_capacity_one() {
        let mut cache = BoundedFrequencyCache::new(1).unwrap();
        cache.insert("x", 1);
        cache.get(&"x");
        cache.get(&"x");

        assert_eq!(cache.insert("y", 2), Some(("x", 1)));
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
    }
}
