//! In-process rate limiting backend.
//!
//! The local backend keeps every user's request timestamps and usage counters
//! in this process using [`DashMap`](dashmap::DashMap).
//!
//! # Key Characteristics
//!
//! - **True sliding window:** each request expires on its own, exactly
//!   `window_size_seconds` after it was recorded
//! - **Thread-safe:** per-user writes are serialized, different users never
//!   contend on the same entry
//! - **Infallible:** no I/O, so the failure policy never applies
//! - **Process-scoped:** state is lost on restart and not shared across
//!   instances
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use ratewarden::local::{LocalRateLimiterOptions, SlidingWindowLocalRateLimiter};
//! use ratewarden::{ManualClock, RateLimitConfig};
//!
//! let clock = ManualClock::at_unix_seconds(0);
//! let limiter = SlidingWindowLocalRateLimiter::new(LocalRateLimiterOptions {
//!     limits: RateLimitConfig::new(2, 60).unwrap(),
//!     clock: Arc::new(clock.clone()),
//! });
//!
//! limiter.record_usage("alice");
//! clock.advance_secs(10);
//! limiter.record_usage("alice");
//! assert!(!limiter.check_user_limit("alice"));
//!
//! clock.advance_secs(51);
//! assert!(limiter.check_user_limit("alice"));
//! ```

use std::sync::Arc;

use crate::{Clock, RateLimitConfig, SystemClock};

mod sliding_window_local_rate_limiter;
pub use sliding_window_local_rate_limiter::*;

mod usage_tracker;
pub use usage_tracker::*;

/// Configuration for [`SlidingWindowLocalRateLimiter`].
#[derive(Clone, Debug)]
pub struct LocalRateLimiterOptions {
    /// Quota settings.
    pub limits: RateLimitConfig,
    /// Source of the current time.
    pub clock: Arc<dyn Clock>,
}

impl Default for LocalRateLimiterOptions {
    fn default() -> Self {
        Self {
            limits: RateLimitConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }
}
