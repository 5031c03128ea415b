use std::time::Duration;

use chrono::TimeDelta;

use crate::{
    BackendKind, CleanupIntervalSeconds, FailMode, RateLimitConfig, RateWardenError,
    RequestsPerWindow, WindowSizeSeconds,
};

#[test]
fn requests_per_window_try_from_validates_nonzero() {
    let r = RequestsPerWindow::try_from(1u64).unwrap();
    assert_eq!(*r, 1u64);

    assert_eq!(*RequestsPerWindow::default(), 100);

    assert!(matches!(
        RequestsPerWindow::try_from(0u64),
        Err(RateWardenError::InvalidRequestsPerWindow(msg))
            if msg == "Requests per window must be greater than 0"
    ));
}

#[test]
fn window_size_seconds_try_from_validates_min_1() {
    let w = WindowSizeSeconds::try_from(1u64).unwrap();
    assert_eq!(*w, 1u64);
    assert_eq!(w.as_time_delta(), TimeDelta::seconds(1));
    assert_eq!(w.sweep_cutoff(), TimeDelta::seconds(2));

    assert_eq!(*WindowSizeSeconds::default(), 3600);

    assert!(matches!(
        WindowSizeSeconds::try_from(0u64),
        Err(RateWardenError::InvalidWindowSize(msg)) if msg == "Window size must be at least 1"
    ));
}

#[test]
fn window_size_seconds_rejects_unrepresentable_windows() {
    assert!(matches!(
        WindowSizeSeconds::try_from(u64::MAX),
        Err(RateWardenError::InvalidWindowSize(msg)) if msg == "Window size is too large"
    ));

    // twice this overflows i64 seconds
    assert!(WindowSizeSeconds::try_from(i64::MAX as u64 / 2 + 1).is_err());
}

#[test]
fn cleanup_interval_try_from_validates_nonzero() {
    let c = CleanupIntervalSeconds::try_from(5u64).unwrap();
    assert_eq!(c.as_duration(), Duration::from_secs(5));

    assert_eq!(*CleanupIntervalSeconds::default(), 300);

    assert!(matches!(
        CleanupIntervalSeconds::try_from(0u64),
        Err(RateWardenError::InvalidCleanupInterval(_))
    ));
}

#[test]
fn rate_limit_config_new_validates_both_fields() {
    let config = RateLimitConfig::new(10, 60).unwrap();
    assert_eq!(*config.requests_per_window, 10);
    assert_eq!(*config.window_size_seconds, 60);

    assert!(matches!(
        RateLimitConfig::new(0, 60),
        Err(RateWardenError::InvalidRequestsPerWindow(_))
    ));
    assert!(matches!(
        RateLimitConfig::new(10, 0),
        Err(RateWardenError::InvalidWindowSize(_))
    ));
}

#[test]
fn fail_mode_parses_case_insensitively() {
    assert_eq!(FailMode::default(), FailMode::Open);
    assert_eq!("open".parse::<FailMode>().unwrap(), FailMode::Open);
    assert_eq!(" Closed ".parse::<FailMode>().unwrap(), FailMode::Closed);

    assert!(matches!(
        "maybe".parse::<FailMode>(),
        Err(RateWardenError::InvalidConfig { name: "RATE_LIMIT_FAIL_MODE", .. })
    ));
}

#[test]
fn backend_kind_parses_known_names() {
    assert_eq!(BackendKind::default(), BackendKind::Local);
    assert_eq!("local".parse::<BackendKind>().unwrap(), BackendKind::Local);
    assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Local);
    assert_eq!("REDIS".parse::<BackendKind>().unwrap(), BackendKind::Redis);

    assert!(matches!(
        "memcached".parse::<BackendKind>(),
        Err(RateWardenError::InvalidConfig { name: "RATE_LIMIT_BACKEND", .. })
    ));
}

#[cfg(feature = "redis")]
mod redis_keys {
    use crate::{
        RateWardenError,
        redis::{RedisKey, RedisKeyGenerator, RedisTimeoutMs},
    };

    #[test]
    fn redis_key_try_from_validates() {
        let k = RedisKey::try_from("myapp".to_string()).unwrap();
        assert_eq!(&**k, "myapp");

        assert_eq!(&**RedisKey::default_prefix(), "ratewarden");

        for (raw, reason) in [
            (String::new(), "Redis key must not be empty"),
            ("a".repeat(256), "Redis key must not be longer than 255 characters"),
            ("my:app".to_string(), "Redis key must not contain colons"),
            ("app*".to_string(), "Redis key must not contain glob characters"),
            ("app[1]".to_string(), "Redis key must not contain glob characters"),
        ] {
            assert!(matches!(
                RedisKey::try_from(raw),
                Err(RateWardenError::InvalidRedisKey(msg)) if msg == reason
            ));
        }

        assert!(RedisKey::try_from("a".repeat(255)).is_ok());
    }

    #[test]
    fn redis_timeout_try_from_validates_nonzero() {
        assert_eq!(*RedisTimeoutMs::default(), 250);
        assert_eq!(*RedisTimeoutMs::try_from(10u64).unwrap(), 10);

        assert!(matches!(
            RedisTimeoutMs::try_from(0u64),
            Err(RateWardenError::InvalidRedisTimeout(_))
        ));
    }

    #[test]
    fn key_generator_layout() {
        let keys = RedisKeyGenerator::new(RedisKey::try_from("app".to_string()).unwrap());

        assert_eq!(keys.get_counter_key("alice"), "app:rate_limit:alice");
        assert_eq!(keys.get_stats_key("alice"), "app:user_stats:alice");
        assert_eq!(&*keys.get_users_key(), "app:users");
        assert_eq!(&***keys.prefix(), "app");
    }
}
