//! Environment-driven configuration.
//!
//! | Variable                       | Default     | Meaning                                  |
//! |--------------------------------|-------------|------------------------------------------|
//! | `RATE_LIMIT_REQUESTS`          | `100`       | requests allowed per window              |
//! | `RATE_LIMIT_WINDOW`            | `3600`      | window length in seconds                 |
//! | `RATE_LIMIT_BACKEND`           | `local`     | `local` or `redis`                       |
//! | `RATE_LIMIT_FAIL_MODE`         | `open`      | `open` or `closed` for failed checks     |
//! | `RATE_LIMIT_CLEANUP_INTERVAL`  | `300`       | seconds between cleanup sweeps           |
//! | `REDIS_URL`                    | see below   | Redis endpoint                           |
//! | `REDIS_HOST` / `REDIS_PORT` / `REDIS_DB` | `localhost` / `6379` / `0` | used when `REDIS_URL` is unset |
//! | `RATE_LIMIT_REDIS_PREFIX`      | `ratewarden`| key prefix                               |
//! | `RATE_LIMIT_REDIS_TIMEOUT_MS`  | `250`       | bound on each Redis round trip           |
//!
//! Any value that fails to parse or validate is an error; nothing falls back
//! silently to a default.

use std::{env, fmt::Display, str::FromStr, sync::Arc};

use crate::{
    CleanupIntervalSeconds, FailMode, FailurePolicy, RateLimitConfig, RateLimiterOptions,
    RateWardenError, RequestsPerWindow, SystemClock, WindowSizeSeconds,
};

#[cfg(feature = "redis")]
use crate::redis::{RedisKey, RedisTimeoutMs};

/// Which store backs the limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process sliding window.
    #[default]
    Local,
    /// Redis fixed window with TTL counters.
    Redis,
}

impl FromStr for BackendKind {
    type Err = RateWardenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "memory" => Ok(Self::Local),
            "redis" => Ok(Self::Redis),
            other => Err(RateWardenError::InvalidConfig {
                name: "RATE_LIMIT_BACKEND",
                reason: format!("expected `local` or `redis`, got `{other}`"),
            }),
        }
    }
}

/// Connection settings for the Redis backend.
#[cfg(feature = "redis")]
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix; `None` uses [`RedisKey::default_prefix`].
    pub prefix: Option<RedisKey>,
    /// Bound on each round trip.
    pub timeout: RedisTimeoutMs,
}

#[cfg(feature = "redis")]
impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            prefix: None,
            timeout: RedisTimeoutMs::default(),
        }
    }
}

impl RateLimiterOptions {
    /// Load options from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, RateWardenError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load options through an arbitrary variable lookup.
    ///
    /// Unset variables take their defaults; set but invalid ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RateWardenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let requests_per_window = match parse_var::<u64, _>(&lookup, "RATE_LIMIT_REQUESTS")? {
            Some(value) => RequestsPerWindow::try_from(value)?,
            None => RequestsPerWindow::default(),
        };

        let window_size_seconds = match parse_var::<u64, _>(&lookup, "RATE_LIMIT_WINDOW")? {
            Some(value) => WindowSizeSeconds::try_from(value)?,
            None => WindowSizeSeconds::default(),
        };

        let cleanup_interval =
            match parse_var::<u64, _>(&lookup, "RATE_LIMIT_CLEANUP_INTERVAL")? {
                Some(value) => CleanupIntervalSeconds::try_from(value)?,
                None => CleanupIntervalSeconds::default(),
            };

        let backend = match lookup("RATE_LIMIT_BACKEND") {
            Some(value) => value.parse()?,
            None => BackendKind::default(),
        };

        let fail_mode = match lookup("RATE_LIMIT_FAIL_MODE") {
            Some(value) => value.parse()?,
            None => FailMode::default(),
        };

        Ok(Self {
            limits: RateLimitConfig {
                requests_per_window,
                window_size_seconds,
            },
            backend,
            failure_policy: FailurePolicy::new(fail_mode),
            cleanup_interval,
            #[cfg(feature = "redis")]
            redis: redis_settings(&lookup)?,
            clock: Arc::new(SystemClock),
        })
    }
}

#[cfg(feature = "redis")]
fn redis_settings<F>(lookup: &F) -> Result<RedisSettings, RateWardenError>
where
    F: Fn(&str) -> Option<String>,
{
    let url = match lookup("REDIS_URL") {
        Some(url) => url,
        None => {
            let host = lookup("REDIS_HOST").unwrap_or_else(|| "localhost".to_string());
            let port = parse_var::<u16, _>(lookup, "REDIS_PORT")?.unwrap_or(6379);
            let db = parse_var::<u32, _>(lookup, "REDIS_DB")?.unwrap_or(0);

            format!("redis://{host}:{port}/{db}")
        }
    };

    let prefix = lookup("RATE_LIMIT_REDIS_PREFIX")
        .map(RedisKey::try_from)
        .transpose()?;

    let timeout = match parse_var::<u64, _>(lookup, "RATE_LIMIT_REDIS_TIMEOUT_MS")? {
        Some(value) => RedisTimeoutMs::try_from(value)?,
        None => RedisTimeoutMs::default(),
    };

    Ok(RedisSettings {
        url,
        prefix,
        timeout,
    })
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, RateWardenError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    raw.trim()
        .parse()
        .map(Some)
        .map_err(|err| RateWardenError::InvalidConfig {
            name,
            reason: format!("`{raw}`: {err}"),
        })
}
