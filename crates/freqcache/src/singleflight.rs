//! Single-flight cache: one computation per key at a time
//!
//! Lock order is always `flights` before the inner cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::cache::SharedCache;
use crate::error::Result;
use crate::stats::CacheStats;

enum FlightState<V> {
    Running,
    Finished(V),
    Abandoned,
}

/// A computation in progress for one key
struct Flight<V> {
    state: Mutex<FlightState<V>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Running),
            done: Condvar::new(),
        }
    }

    /// Block until the leader finishes; `None` if it produced no value
    fn wait(&self) -> Option<V> {
        let mut state = self.state.lock();
        while matches!(*state, FlightState::Running) {
            self.done.wait(&mut state);
        }
        match &*state {
            FlightState::Finished(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn finish(&self, outcome: FlightState<V>) {
        *self.state.lock() = outcome;
        self.done.notify_all();
    }
}

enum Role<V> {
    Hit(V),
    Leader(Arc<Flight<V>>),
    Waiter(Arc<Flight<V>>),
}

type Flights<K, V> = Arc<Mutex<HashMap<K, Arc<Flight<V>>, RandomState>>>;

/// Bounded LFU cache that coalesces concurrent misses on the same key
///
/// The first caller to miss a key becomes its leader and runs the
/// computation; callers arriving while it runs block and receive the
/// leader's value. A failed (or panicking) leader hands nothing to its
/// waiters: they retry, and one of them leads the next attempt.
pub struct CoalescingCache<K, V> {
    cache: SharedCache<K, V>,
    flights: Flights<K, V>,
}

impl<K, V> Clone for CoalescingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<K, V> CoalescingCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new cache with the given capacity
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            cache: SharedCache::new(capacity)?,
            flights: Arc::new(Mutex::new(HashMap::with_hasher(RandomState::new()))),
        })
    }

    /// Get a value or compute it, sharing in-flight computations
    ///
    /// `compute` runs only if this caller ends up leading a computation for
    /// `key`. Every lookup records one hit or miss: a waiter records a miss
    /// when it joins a flight, and another each time it retries after a
    /// failed leader. A waiter served by its leader counts a use of the
    /// entry if the entry is still cached.
    pub fn get_or_compute<F, E>(&self, key: K, compute: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
    {
        let flight = loop {
            match self.join(&key) {
                Role::Hit(value) => return Ok(value),
                Role::Leader(flight) => break flight,
                Role::Waiter(flight) => {
                    if let Some(value) = flight.wait() {
                        self.cache.touch(&key);
                        return Ok(value);
                    }
                    debug!("in-flight computation produced no value, retrying");
                }
            }
        };

        let mut guard = LeaderGuard {
            flights: &self.flights,
            key: Some(key),
            flight,
        };

        match compute() {
            Ok(value) => Ok(guard.complete(&self.cache, value)),
            Err(e) => {
                self.cache.stats().record_failure();
                debug!("computation failed, nothing cached");
                drop(guard);
                Err(e)
            }
        }
    }

    /// Number of keys with a computation in progress
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    /// The underlying cache
    pub fn cache(&self) -> &SharedCache<K, V> {
        &self.cache
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Get current cache size
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn join(&self, key: &K) -> Role<V> {
        let mut flights = self.flights.lock();

        if let Some(value) = self.cache.get(key) {
            return Role::Hit(value);
        }

        match flights.get(key) {
            Some(flight) => Role::Waiter(Arc::clone(flight)),
            None => {
                let flight = Arc::new(Flight::new());
                flights.insert(key.clone(), Arc::clone(&flight));
                Role::Leader(flight)
            }
        }
    }
}

/// Unregisters the leader's flight, also when `compute` panics
struct LeaderGuard<'a, K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    flights: &'a Flights<K, V>,
    key: Option<K>,
    flight: Arc<Flight<V>>,
}

impl<K, V> LeaderGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn complete(&mut self, cache: &SharedCache<K, V>, value: V) -> V {
        let mut flights = self.flights.lock();
        if let Some(key) = self.key.take() {
            flights.remove(&key);
            let value = cache.store(key, value);
            self.flight.finish(FlightState::Finished(value.clone()));
            return value;
        }
        value
    }
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.flights.lock().remove(&key);
            self.flight.finish(FlightState::Abandoned);
        }
    }
}
