//! Redis-backed rate limiting backend.
//!
//! Keeps one TTL counter and one usage hash per user in Redis, so quotas are
//! shared by every process pointing at the same prefix and survive restarts.
//! The accounting is a fixed window, see [`FixedWindowRedisRateLimiter`].
//!
//! # Requirements
//!
//! - **Redis:** >= 6.2.0 (multi-field `HSET`)
//! - **Runtime:** Tokio

use std::sync::Arc;

use crate::{Clock, RateLimitConfig, SystemClock};

mod common;
pub use common::*;

mod redis_connection;
pub use redis_connection::*;

mod fixed_window_redis_rate_limiter;
pub use fixed_window_redis_rate_limiter::*;

/// Configuration for [`FixedWindowRedisRateLimiter`].
///
/// # Examples
///
/// ```
/// use ratewarden::redis::{FixedWindowRedisRateLimiter, RedisKey, RedisRateLimiterOptions};
///
/// let options = RedisRateLimiterOptions {
///     url: "redis://127.0.0.1:6379/0".to_string(),
///     prefix: Some(RedisKey::try_from("market_api".to_string()).unwrap()),
///     ..Default::default()
/// };
///
/// // no connection is attempted yet
/// let limiter = FixedWindowRedisRateLimiter::new(options).unwrap();
/// # let _ = limiter;
/// ```
#[derive(Clone, Debug)]
pub struct RedisRateLimiterOptions {
    /// Redis connection URL, e.g. `redis://localhost:6379/0`.
    pub url: String,

    /// Optional prefix for all Redis keys.
    ///
    /// If `None`, defaults to `"ratewarden"`.
    pub prefix: Option<RedisKey>,

    /// Upper bound on each round trip. Expiry counts as a store failure.
    pub timeout: RedisTimeoutMs,

    /// Quota settings.
    pub limits: RateLimitConfig,

    /// Source of the current time for reset times and usage timestamps.
    pub clock: Arc<dyn Clock>,
}

impl Default for RedisRateLimiterOptions {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            prefix: None,
            timeout: RedisTimeoutMs::default(),
            limits: RateLimitConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }
}
