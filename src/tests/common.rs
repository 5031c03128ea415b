use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::{
    ManualClock, RateLimitConfig, RateLimiter, RateLimiterOptions,
    local::{LocalRateLimiterOptions, SlidingWindowLocalRateLimiter},
};

/// Mid-morning UTC, so a few windows never cross midnight by accident.
pub(crate) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

pub(crate) fn local_limiter(
    requests_per_window: u64,
    window_size_seconds: u64,
) -> (SlidingWindowLocalRateLimiter, ManualClock) {
    let clock = ManualClock::new(start());

    let limiter = SlidingWindowLocalRateLimiter::new(LocalRateLimiterOptions {
        limits: RateLimitConfig::new(requests_per_window, window_size_seconds).unwrap(),
        clock: Arc::new(clock.clone()),
    });

    (limiter, clock)
}

pub(crate) fn local_facade(
    requests_per_window: u64,
    window_size_seconds: u64,
) -> (Arc<RateLimiter>, ManualClock) {
    let clock = ManualClock::new(start());

    let options = RateLimiterOptions {
        limits: RateLimitConfig::new(requests_per_window, window_size_seconds).unwrap(),
        clock: Arc::new(clock.clone()),
        ..RateLimiterOptions::default()
    };

    (Arc::new(RateLimiter::new(options).unwrap()), clock)
}
