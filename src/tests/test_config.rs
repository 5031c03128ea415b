use std::collections::HashMap;

use crate::{BackendKind, FailMode, RateLimiterOptions, RateWardenError};

fn options_from(vars: &[(&str, &str)]) -> Result<RateLimiterOptions, RateWardenError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    RateLimiterOptions::from_lookup(|name| vars.get(name).cloned())
}

#[test]
fn empty_environment_gives_defaults() {
    let options = options_from(&[]).unwrap();

    assert_eq!(*options.limits.requests_per_window, 100);
    assert_eq!(*options.limits.window_size_seconds, 3600);
    assert_eq!(options.backend, BackendKind::Local);
    assert_eq!(options.failure_policy.check, FailMode::Open);
    assert_eq!(*options.cleanup_interval, 300);
}

#[test]
fn overrides_are_applied() {
    let options = options_from(&[
        ("RATE_LIMIT_REQUESTS", "25"),
        ("RATE_LIMIT_WINDOW", " 60 "),
        ("RATE_LIMIT_BACKEND", "redis"),
        ("RATE_LIMIT_FAIL_MODE", "closed"),
        ("RATE_LIMIT_CLEANUP_INTERVAL", "30"),
    ])
    .unwrap();

    assert_eq!(*options.limits.requests_per_window, 25);
    assert_eq!(*options.limits.window_size_seconds, 60);
    assert_eq!(options.backend, BackendKind::Redis);
    assert_eq!(options.failure_policy.check, FailMode::Closed);
    assert_eq!(*options.cleanup_interval, 30);
}

#[test]
fn unparsable_number_names_the_variable() {
    let err = options_from(&[("RATE_LIMIT_REQUESTS", "lots")]).unwrap_err();

    assert!(matches!(
        err,
        RateWardenError::InvalidConfig { name: "RATE_LIMIT_REQUESTS", .. }
    ));
}

#[test]
fn out_of_range_values_are_rejected() {
    assert!(matches!(
        options_from(&[("RATE_LIMIT_REQUESTS", "0")]),
        Err(RateWardenError::InvalidRequestsPerWindow(_))
    ));
    assert!(matches!(
        options_from(&[("RATE_LIMIT_WINDOW", "0")]),
        Err(RateWardenError::InvalidWindowSize(_))
    ));
    assert!(matches!(
        options_from(&[("RATE_LIMIT_WINDOW", "-5")]),
        Err(RateWardenError::InvalidConfig { name: "RATE_LIMIT_WINDOW", .. })
    ));
    assert!(matches!(
        options_from(&[("RATE_LIMIT_CLEANUP_INTERVAL", "0")]),
        Err(RateWardenError::InvalidCleanupInterval(_))
    ));
}

#[test]
fn unknown_backend_and_fail_mode_are_rejected() {
    assert!(options_from(&[("RATE_LIMIT_BACKEND", "etcd")]).is_err());
    assert!(options_from(&[("RATE_LIMIT_FAIL_MODE", "ajar")]).is_err());
}

#[cfg(feature = "redis")]
mod redis_settings {
    use super::options_from;
    use crate::RateWardenError;

    #[test]
    fn default_redis_settings() {
        let options = options_from(&[]).unwrap();

        assert_eq!(options.redis.url, "redis://localhost:6379/0");
        assert!(options.redis.prefix.is_none());
        assert_eq!(*options.redis.timeout, 250);
    }

    #[test]
    fn url_built_from_host_port_db() {
        let options = options_from(&[
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_DB", "3"),
        ])
        .unwrap();

        assert_eq!(options.redis.url, "redis://cache.internal:6380/3");
    }

    #[test]
    fn redis_url_wins_over_parts() {
        let options = options_from(&[
            ("REDIS_URL", "redis://primary:6379/1"),
            ("REDIS_HOST", "ignored"),
        ])
        .unwrap();

        assert_eq!(options.redis.url, "redis://primary:6379/1");
    }

    #[test]
    fn prefix_and_timeout_are_validated() {
        let options = options_from(&[
            ("RATE_LIMIT_REDIS_PREFIX", "market_api"),
            ("RATE_LIMIT_REDIS_TIMEOUT_MS", "40"),
        ])
        .unwrap();

        assert_eq!(&**options.redis.prefix.unwrap(), "market_api");
        assert_eq!(*options.redis.timeout, 40);

        assert!(matches!(
            options_from(&[("RATE_LIMIT_REDIS_PREFIX", "a:b")]),
            Err(RateWardenError::InvalidRedisKey(_))
        ));
        assert!(matches!(
            options_from(&[("RATE_LIMIT_REDIS_TIMEOUT_MS", "0")]),
            Err(RateWardenError::InvalidRedisTimeout(_))
        ));
        assert!(matches!(
            options_from(&[("REDIS_PORT", "99999")]),
            Err(RateWardenError::InvalidConfig { name: "REDIS_PORT", .. })
        ));
    }
}
