//! Error types for freqcache

/// Result type alias for cache construction
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the cache itself.
///
/// Failures of a wrapped computation are never converted into this type;
/// they are handed back to the caller exactly as the computation produced them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A cache that can hold nothing was requested
    #[error("cache capacity must be greater than 0")]
    ZeroCapacity,
}
