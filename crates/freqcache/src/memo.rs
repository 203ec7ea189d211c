//! Memoized: an operation bound to its own cache instance

use std::hash::Hash;
use std::marker::PhantomData;

use crate::cache::SharedCache;
use crate::error::Result;

/// Capacity used by [`Memoized::with_default_capacity`]
pub const DEFAULT_CAPACITY: usize = 3;

/// Wraps an expensive operation with an owned LFU cache
///
/// ```
/// use freqcache::Memoized;
///
/// let square = Memoized::new(16, |n: &u64| Ok::<_, std::convert::Infallible>(n * n)).unwrap();
/// assert_eq!(square.call(12).unwrap(), 144);
/// assert_eq!(square.cache().stats().misses(), 1);
/// ```
pub struct Memoized<A, V, E, F> {
    cache: SharedCache<A, V>,
    operation: F,
    _error: PhantomData<fn() -> E>,
}

impl<A, V, E, F> Memoized<A, V, E, F>
where
    A: Hash + Eq + Clone,
    V: Clone,
    F: Fn(&A) -> std::result::Result<V, E>,
{
    /// Wrap `operation` with a cache of `capacity` entries
    pub fn new(capacity: usize, operation: F) -> Result<Self> {
        Ok(Self {
            cache: SharedCache::new(capacity)?,
            operation,
            _error: PhantomData,
        })
    }

    /// Wrap `operation` with a cache of [`DEFAULT_CAPACITY`] entries
    pub fn with_default_capacity(operation: F) -> Self {
        Self {
            cache: SharedCache::new(DEFAULT_CAPACITY)
                .unwrap_or_else(|_| unreachable!("default capacity is non-zero")),
            operation,
            _error: PhantomData,
        }
    }

    /// Call the operation, or return the cached result for equal arguments
    pub fn call(&self, args: A) -> std::result::Result<V, E> {
        let operation = &self.operation;
        let key = args.clone();
        self.cache.get_or_compute(key, || operation(&args))
    }

    /// The cache owned by this wrapper
    pub fn cache(&self) -> &SharedCache<A, V> {
        &self.cache
    }
}
