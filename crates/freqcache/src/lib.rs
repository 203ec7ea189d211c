//! # freqcache
//!
//! Bounded call-result cache with LFU eviction, for memoizing expensive
//! operations keyed by their arguments.
//!
//! ## Architecture
//! - **HashMap**: AHash for fast key lookups (O(1))
//! - **Frequency index**: BTreeMap from usage count to a recency-ordered
//!   doubly-linked list of arena slots; eviction takes the least recently
//!   touched entry among those with the lowest count (O(log F))
//! - **SharedCache**: one mutex around the cache, computations run unlocked
//! - **CoalescingCache**: opt-in single-flight for concurrent misses
//!
//! ## Usage
//! ```
//! use freqcache::{CacheKey, SharedCache};
//!
//! let cache = SharedCache::new(3).unwrap();
//! let key = CacheKey::builder().arg("https://ithillel.ua/").kwarg("first_n", 100u32).build();
//!
//! let body = cache.get_or_compute(key.clone(), || Ok::<_, ()>(b"<!doctype html>".to_vec())).unwrap();
//! let again = cache.get_or_compute(key, || Err(())).unwrap();
//! assert_eq!(body, again);
//! ```

#![warn(missing_docs)]

mod cache;
mod error;
mod key;
mod lfu;
mod memo;
mod singleflight;
mod stats;

pub use cache::SharedCache;
pub use error::{Error, Result};
pub use key::{ArgValue, CacheKey, KeyBuilder};
pub use lfu::{BoundedFrequencyCache, KeysByPriority};
pub use memo::{Memoized, DEFAULT_CAPACITY};
pub use singleflight::CoalescingCache;
pub use stats::{CacheStats, StatsSnapshot};
