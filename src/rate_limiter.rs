//! Top-level entrypoint that wires a backend to the request-handling layer.
//!
//! A [`RateLimiter`] is built once at startup, shared behind an [`Arc`], and
//! handed to every request handler. It owns exactly one backend, chosen by
//! [`RateLimiterOptions::backend`]:
//!
//! - [`BackendKind::Local`]: true sliding window kept in this process
//! - [`BackendKind::Redis`]: fixed window with a Redis TTL counter
//!
//! The two are not interchangeable; see their type-level docs.
//!
//! None of the per-request operations return errors. Store failures are
//! resolved by the [`FailurePolicy`] and logged.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, PoisonError, Weak},
    time::Duration,
};

use tokio::task::JoinHandle;

use crate::{
    BackendKind, CleanupIntervalSeconds, Clock, FailurePolicy, GlobalStats, RateLimitConfig,
    RateWardenError, SystemClock, UserStats,
    local::{LocalRateLimiterOptions, SlidingWindowLocalRateLimiter},
    runtime,
};

#[cfg(feature = "redis")]
use crate::{
    RedisSettings,
    redis::{FixedWindowRedisRateLimiter, RedisRateLimiterOptions},
};

/// Top-level configuration for [`RateLimiter`].
#[derive(Clone, Debug)]
pub struct RateLimiterOptions {
    /// Quota settings.
    pub limits: RateLimitConfig,
    /// Which store to use.
    pub backend: BackendKind,
    /// Fallbacks on store failure.
    pub failure_policy: FailurePolicy,
    /// Period of the background sweep started by [`RateLimiter::run_cleanup_loop`].
    pub cleanup_interval: CleanupIntervalSeconds,
    /// Connection settings, used when `backend` is [`BackendKind::Redis`].
    #[cfg(feature = "redis")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
    pub redis: RedisSettings,
    /// Source of the current time.
    pub clock: Arc<dyn Clock>,
}

impl Default for RateLimiterOptions {
    fn default() -> Self {
        Self {
            limits: RateLimitConfig::default(),
            backend: BackendKind::default(),
            failure_policy: FailurePolicy::default(),
            cleanup_interval: CleanupIntervalSeconds::default(),
            #[cfg(feature = "redis")]
            redis: RedisSettings::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

/// The store behind a [`RateLimiter`].
#[derive(Debug)]
pub enum RateLimiterBackend {
    /// In-process sliding window.
    Local(SlidingWindowLocalRateLimiter),
    /// Redis fixed window.
    #[cfg(feature = "redis")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
    Redis(FixedWindowRedisRateLimiter),
}

/// Rate limiter entrypoint.
///
/// The request layer calls [`check_user_limit`](Self::check_user_limit)
/// before doing expensive work and [`record_usage`](Self::record_usage) only
/// after that work succeeded, so failed work never consumes quota.
pub struct RateLimiter {
    backend: RateLimiterBackend,
    config: RateLimitConfig,
    failure_policy: FailurePolicy,
    cleanup_interval: Duration,
    clock: Arc<dyn Clock>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a new [`RateLimiter`].
    ///
    /// Fails only on configuration errors, e.g. a malformed Redis URL or
    /// selecting Redis in a build without the `redis` feature. The Redis
    /// backend connects lazily, so an unreachable server is not an error here.
    pub fn new(options: RateLimiterOptions) -> Result<Self, RateWardenError> {
        let backend = match options.backend {
            BackendKind::Local => {
                RateLimiterBackend::Local(SlidingWindowLocalRateLimiter::new(
                    LocalRateLimiterOptions {
                        limits: options.limits,
                        clock: options.clock.clone(),
                    },
                ))
            }
            #[cfg(feature = "redis")]
            BackendKind::Redis => {
                let RedisSettings {
                    url,
                    prefix,
                    timeout,
                } = options.redis;

                RateLimiterBackend::Redis(FixedWindowRedisRateLimiter::new(
                    RedisRateLimiterOptions {
                        url,
                        prefix,
                        timeout,
                        limits: options.limits,
                        clock: options.clock.clone(),
                    },
                )?)
            }
            #[cfg(not(feature = "redis"))]
            BackendKind::Redis => {
                return Err(RateWardenError::InvalidConfig {
                    name: "RATE_LIMIT_BACKEND",
                    reason: "built without the `redis` feature".to_string(),
                });
            }
        };

        tracing::info!(
            backend = ?options.backend,
            requests_per_window = *options.limits.requests_per_window,
            window_size_seconds = *options.limits.window_size_seconds,
            fail_mode = ?options.failure_policy.check,
            "rate limiter initialized"
        );

        Ok(Self {
            backend,
            config: options.limits,
            failure_policy: options.failure_policy,
            cleanup_interval: options.cleanup_interval.as_duration(),
            clock: options.clock,
            cleanup_task: Mutex::new(None),
        })
    }

    /// Create a [`RateLimiter`] configured from the environment.
    ///
    /// See [`crate::config`] for the recognized variables.
    pub fn from_env() -> Result<Self, RateWardenError> {
        Self::new(RateLimiterOptions::from_env()?)
    }

    /// Quota settings.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Fallbacks applied on store failure.
    pub fn failure_policy(&self) -> &FailurePolicy {
        &self.failure_policy
    }

    /// The backend in use.
    pub fn backend(&self) -> &RateLimiterBackend {
        &self.backend
    }

    /// Access the local backend, if that is the one in use.
    pub fn local(&self) -> Option<&SlidingWindowLocalRateLimiter> {
        match &self.backend {
            RateLimiterBackend::Local(local) => Some(local),
            #[cfg(feature = "redis")]
            RateLimiterBackend::Redis(_) => None,
        }
    }

    /// Access the Redis backend, if that is the one in use.
    #[cfg(feature = "redis")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
    pub fn redis(&self) -> Option<&FixedWindowRedisRateLimiter> {
        match &self.backend {
            RateLimiterBackend::Redis(redis) => Some(redis),
            RateLimiterBackend::Local(_) => None,
        }
    }

    /// Whether `username` may start another request.
    ///
    /// Does not count the request. On store failure the answer comes from
    /// [`FailurePolicy::check`].
    pub async fn check_user_limit(&self, username: &str) -> bool {
        let result: Result<bool, RateWardenError> = match &self.backend {
            RateLimiterBackend::Local(local) => Ok(local.check_user_limit(username)),
            #[cfg(feature = "redis")]
            RateLimiterBackend::Redis(redis) => redis.check_user_limit(username).await,
        };

        match result {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(username, "rate limit exceeded");
                false
            }
            Err(err) => self.failure_policy.on_check_failure(username, &err),
        }
    } // end method check_user_limit

    /// Count one successful request for `username`.
    ///
    /// Every call counts; calling twice consumes two requests.
    pub async fn record_usage(&self, username: &str) {
        let result: Result<(), RateWardenError> = match &self.backend {
            RateLimiterBackend::Local(local) => {
                local.record_usage(username);
                Ok(())
            }
            #[cfg(feature = "redis")]
            RateLimiterBackend::Redis(redis) => redis.record_usage(username).await.map(|_| ()),
        };

        match result {
            Ok(()) => tracing::debug!(username, "recorded usage"),
            Err(err) => self.failure_policy.on_record_failure(username, &err),
        }
    } // end method record_usage

    /// Quota and usage snapshot for `username`.
    pub async fn get_user_stats(&self, username: &str) -> UserStats {
        let result: Result<UserStats, RateWardenError> = match &self.backend {
            RateLimiterBackend::Local(local) => Ok(local.get_user_stats(username)),
            #[cfg(feature = "redis")]
            RateLimiterBackend::Redis(redis) => redis.get_user_stats(username).await,
        };

        result.unwrap_or_else(|err| {
            self.failure_policy
                .on_stats_failure(username, &err, &self.config, self.clock.now())
        })
    } // end method get_user_stats

    /// `X-RateLimit-*` response headers for `username`.
    ///
    /// Keys: `X-RateLimit-Limit`, `X-RateLimit-Remaining`, `X-RateLimit-Reset`
    /// (RFC 3339), `X-RateLimit-Window` (seconds).
    pub async fn get_rate_limit_info(&self, username: &str) -> BTreeMap<&'static str, String> {
        self.get_user_stats(username).await.rate_limit_headers()
    }

    /// Forget `username`'s in-window requests. Usage statistics are kept.
    ///
    /// Returns `false` if the store could not be cleared.
    pub async fn reset_user_limits(&self, username: &str) -> bool {
        let result: Result<bool, RateWardenError> = match &self.backend {
            RateLimiterBackend::Local(local) => Ok(local.reset_user_limits(username)),
            #[cfg(feature = "redis")]
            RateLimiterBackend::Redis(redis) => redis.reset_user_limits(username).await,
        };

        match result {
            Ok(reset) => {
                tracing::info!(username, "rate limits reset");
                reset
            }
            Err(err) => self.failure_policy.on_reset_failure(username, &err),
        }
    } // end method reset_user_limits

    /// Aggregate usage across all users.
    pub async fn get_global_stats(&self) -> GlobalStats {
        let result: Result<GlobalStats, RateWardenError> = match &self.backend {
            RateLimiterBackend::Local(local) => Ok(local.get_global_stats()),
            #[cfg(feature = "redis")]
            RateLimiterBackend::Redis(redis) => redis.get_global_stats().await,
        };

        result.unwrap_or_else(|err| {
            self.failure_policy
                .on_global_stats_failure(&err, &self.config, self.clock.now())
        })
    } // end method get_global_stats

    /// Evict stale window data.
    ///
    /// Uses a cutoff of twice the window, looser than the one admission
    /// checks apply, so how often this runs never changes a decision.
    pub async fn cleanup_old_data(&self) {
        let result: Result<usize, RateWardenError> = match &self.backend {
            RateLimiterBackend::Local(local) => Ok(local.cleanup_old_data()),
            #[cfg(feature = "redis")]
            RateLimiterBackend::Redis(redis) => redis.cleanup_old_data().await,
        };

        match result {
            Ok(removed) => tracing::debug!(removed, "cleanup sweep finished"),
            Err(err) => self.failure_policy.on_cleanup_failure(&err),
        }
    } // end method cleanup_old_data

    /// Start the background sweep at the configured interval.
    ///
    /// See [`Self::run_cleanup_loop_with_interval`].
    pub fn run_cleanup_loop(self: &Arc<Self>) -> Result<(), RateWardenError> {
        self.run_cleanup_loop_with_interval(self.cleanup_interval)
    }

    /// Start a Tokio task that calls [`Self::cleanup_old_data`] every `interval`,
    /// the first time immediately.
    ///
    /// Idempotent: while a loop is running further calls do nothing, even with a
    /// different interval. The task only holds a weak reference and ends once
    /// the limiter is dropped. Must be called from within a Tokio runtime.
    pub fn run_cleanup_loop_with_interval(
        self: &Arc<Self>,
        interval: Duration,
    ) -> Result<(), RateWardenError> {
        let mut cleanup_task = self
            .cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if cleanup_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let limiter: Weak<Self> = Arc::downgrade(self);

        let task = runtime::spawn_task(async move {
            let mut interval = runtime::new_interval(interval);

            loop {
                runtime::tick(&mut interval).await;

                let Some(limiter) = limiter.upgrade() else {
                    break;
                };

                limiter.cleanup_old_data().await;
            }
        })?;

        *cleanup_task = Some(task);

        Ok(())
    } // end method run_cleanup_loop_with_interval

    /// Stop the background sweep. Idempotent; the loop can be started again.
    pub fn stop_cleanup_loop(&self) {
        let task = self
            .cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            task.abort();
        }
    }

    /// Whether a background sweep is currently running.
    pub fn is_cleanup_loop_running(&self) -> bool {
        self.cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.stop_cleanup_loop();
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.backend)
            .field("config", &self.config)
            .field("failure_policy", &self.failure_policy)
            .field("cleanup_interval", &self.cleanup_interval)
            .finish_non_exhaustive()
    }
}
