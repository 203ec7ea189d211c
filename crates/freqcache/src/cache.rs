//! SharedCache: thread-safe handle around a bounded LFU cache

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Result;
use crate::lfu::BoundedFrequencyCache;
use crate::stats::CacheStats;

/// Cloneable cache handle shared between threads or tasks
///
/// A single mutex guards the whole structure, so every hit and every insert
/// is applied atomically. Computations run with the lock released: misses on
/// different keys proceed in parallel, and concurrent misses on the same key
/// each run their own computation. See
/// [`CoalescingCache`](crate::CoalescingCache) for the single-flight variant.
pub struct SharedCache<K, V> {
    /// Frequency-ordered entries
    cache: Arc<Mutex<BoundedFrequencyCache<K, V>>>,

    /// Cache statistics
    stats: Arc<CacheStats>,

    /// Cache capacity
    capacity: usize,
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            stats: Arc::clone(&self.stats),
            capacity: self.capacity,
        }
    }
}

impl<K, V> SharedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new SharedCache with the given capacity
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of items in cache
    ///
    /// # Returns
    /// * `Result<SharedCache>` - Fails with `ZeroCapacity` if `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            cache: Arc::new(Mutex::new(BoundedFrequencyCache::new(capacity)?)),
            stats: Arc::new(CacheStats::new()),
            capacity,
        })
    }

    /// Get a value from the cache or compute it
    ///
    /// # Arguments
    /// * `key` - Key derived from the call's arguments
    /// * `compute` - Runs only on a miss
    ///
    /// # Returns
    /// * The cached or freshly computed value, or the error `compute`
    ///   returned. A failed computation stores nothing and evicts nothing.
    pub fn get_or_compute<F, E>(&self, key: K, compute: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        match compute() {
            Ok(value) => Ok(self.store(key, value)),
            Err(e) => {
                self.stats.record_failure();
                debug!("computation failed, nothing cached");
                Err(e)
            }
        }
    }

    /// Async form of [`get_or_compute`](Self::get_or_compute)
    ///
    /// The lock is never held while `compute` is awaited. Dropping the
    /// returned future before it completes leaves the cache unchanged.
    pub async fn get_or_compute_async<F, Fut, E>(
        &self,
        key: K,
        compute: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        match compute().await {
            Ok(value) => Ok(self.store(key, value)),
            Err(e) => {
                self.stats.record_failure();
                debug!("computation failed, nothing cached");
                Err(e)
            }
        }
    }

    /// Get a value, counting a use on a hit
    pub fn get(&self, key: &K) -> Option<V> {
        self.lookup(key)
    }

    /// Store a precomputed value, returning the evicted entry if any
    pub fn insert(&self, key: K, value: V) -> Option<(K, V)> {
        let mut cache = self.cache.lock();
        let fresh = !cache.contains(&key);
        let evicted = cache.insert(key, value);
        if fresh {
            self.stats.record_insert();
        }
        if evicted.is_some() {
            self.stats.record_eviction();
            debug!(len = cache.len(), "evicted least frequently used entry");
        }
        evicted
    }

    /// Remove a value from the cache
    pub fn remove(&self, key: &K) -> Option<V> {
        self.cache.lock().remove(key)
    }

    /// Check whether `key` is cached, without counting a use
    pub fn contains(&self, key: &K) -> bool {
        self.cache.lock().contains(key)
    }

    /// Usage count of a cached key
    pub fn usage_count(&self, key: &K) -> Option<u64> {
        self.cache.lock().usage_count(key)
    }

    /// Key the next eviction would select
    pub fn victim(&self) -> Option<K> {
        self.cache.lock().victim().cloned()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get current cache size
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry and reset statistics
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        cache.clear();
        self.stats.reset();
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(value) => {
                self.stats.record_hit();
                trace!("cache hit");
                Some(value.clone())
            }
            None => {
                self.stats.record_miss();
                trace!("cache miss");
                None
            }
        }
    }

    /// Count a use of `key` without recording a hit
    pub(crate) fn touch(&self, key: &K) {
        self.cache.lock().get(key);
    }

    /// Insert a computed value; a concurrent miss may have stored the key first
    pub(crate) fn store(&self, key: K, value: V) -> V {
        let mut cache = self.cache.lock();
        if cache.get(&key).is_some() {
            return value;
        }

        if cache.insert(key, value.clone()).is_some() {
            self.stats.record_eviction();
            debug!(len = cache.len(), "evicted least frequently used entry");
        }
        self.stats.record_insert();
        value
    }
}
