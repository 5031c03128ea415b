use std::time::Duration;

/// Error type for this crate.
///
/// Configuration variants are fatal and surface from constructors. Store
/// variants ([`RateWardenError::RedisError`], [`RateWardenError::StoreTimeout`],
/// [`RateWardenError::InvalidStoredValue`]) are absorbed by the
/// [`RateLimiter`](crate::RateLimiter) facade through its
/// [`FailurePolicy`](crate::FailurePolicy).
#[derive(Debug, thiserror::Error)]
pub enum RateWardenError {
    /// Redis error.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// A store round trip did not finish within the configured bound.
    #[error("store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    /// A value read back from the store could not be decoded.
    #[error("unexpected value in store: {0}")]
    InvalidStoredValue(String),

    /// Invalid requests-per-window limit.
    #[error("invalid requests per window: {0}")]
    InvalidRequestsPerWindow(String),

    /// Invalid window size.
    #[error("invalid window size: {0}")]
    InvalidWindowSize(String),

    /// Invalid cleanup sweep interval.
    #[error("invalid cleanup interval: {0}")]
    InvalidCleanupInterval(String),

    /// Invalid Redis key or key prefix.
    #[error("invalid redis key: {0}")]
    InvalidRedisKey(String),

    /// Invalid Redis round-trip timeout.
    #[error("invalid redis timeout: {0}")]
    InvalidRedisTimeout(String),

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {name}: {reason}")]
    InvalidConfig {
        /// Name of the offending variable.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The cleanup loop was started outside of a Tokio runtime.
    #[error("no async runtime available: {0}")]
    RuntimeUnavailable(String),
}
