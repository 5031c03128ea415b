use std::sync::Arc;

use crate::{
    BackendKind, FailMode, FailurePolicy, GlobalStats, HEADER_REMAINING, ManualClock,
    RateLimitConfig, RateLimiter, RateLimiterOptions, RedisSettings, UserStats,
    redis::RedisTimeoutMs, tests::common::start,
};

// nothing listens on port 1
const UNREACHABLE_URL: &str = "redis://127.0.0.1:1/0";

fn unreachable_limiter(fail_mode: FailMode) -> RateLimiter {
    let options = RateLimiterOptions {
        limits: RateLimitConfig::new(5, 60).unwrap(),
        backend: BackendKind::Redis,
        failure_policy: FailurePolicy::new(fail_mode),
        redis: RedisSettings {
            url: UNREACHABLE_URL.to_string(),
            prefix: None,
            timeout: RedisTimeoutMs::try_from(200).unwrap(),
        },
        clock: Arc::new(ManualClock::new(start())),
        ..RateLimiterOptions::default()
    };

    RateLimiter::new(options).unwrap()
}

#[tokio::test]
async fn failed_check_fails_open_by_default() {
    let limiter = unreachable_limiter(FailMode::default());

    assert!(limiter.check_user_limit("alice").await);
}

#[tokio::test]
async fn failed_check_fails_closed_when_configured() {
    let limiter = unreachable_limiter(FailMode::Closed);

    assert!(!limiter.check_user_limit("alice").await);
}

#[tokio::test]
async fn failed_record_is_swallowed() {
    let limiter = unreachable_limiter(FailMode::Open);

    limiter.record_usage("alice").await;
}

#[tokio::test]
async fn failed_stats_are_degraded() {
    let limiter = unreachable_limiter(FailMode::Open);
    let config = RateLimitConfig::new(5, 60).unwrap();

    let stats = limiter.get_user_stats("alice").await;
    assert_eq!(stats, UserStats::degraded(&config, start()));

    let headers = limiter.get_rate_limit_info("alice").await;
    assert_eq!(headers[HEADER_REMAINING], "5");

    let global = limiter.get_global_stats().await;
    assert_eq!(global, GlobalStats::degraded(&config, start()));
}

#[tokio::test]
async fn failed_reset_reports_false() {
    let limiter = unreachable_limiter(FailMode::Open);

    assert!(!limiter.reset_user_limits("alice").await);
}

#[tokio::test]
async fn cleanup_never_touches_redis() {
    let limiter = unreachable_limiter(FailMode::Open);

    limiter.cleanup_old_data().await;
    assert_eq!(limiter.redis().unwrap().cleanup_old_data().await.unwrap(), 0);
}

#[tokio::test]
async fn backend_surfaces_the_error() {
    let limiter = unreachable_limiter(FailMode::Open);
    let redis = limiter.redis().unwrap();

    assert!(redis.check_user_limit("alice").await.is_err());
    assert!(redis.record_usage("alice").await.is_err());
    assert!(redis.get_global_stats().await.is_err());
}
