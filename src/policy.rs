//! What each facade operation answers when its backing store fails.
//!
//! | Operation            | On store failure                                  |
//! |----------------------|---------------------------------------------------|
//! | `check_user_limit`   | [`FailMode::Open`] → `true`, [`FailMode::Closed`] → `false` |
//! | `record_usage`       | logged and dropped                                |
//! | `get_user_stats`     | [`UserStats::degraded`]                           |
//! | `get_rate_limit_info`| headers of [`UserStats::degraded`]                |
//! | `reset_user_limits`  | `false`                                           |
//! | `get_global_stats`   | [`GlobalStats::degraded`]                         |
//! | `cleanup_old_data`   | logged and dropped                                |
//!
//! Every failure is logged with the underlying error before the fallback is
//! returned; none is propagated to the caller.

use chrono::{DateTime, Utc};

use crate::{FailMode, GlobalStats, RateLimitConfig, RateWardenError, UserStats};

/// Fallbacks applied by [`RateLimiter`](crate::RateLimiter) on store failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Answer for failed admission checks.
    pub check: FailMode,
}

impl FailurePolicy {
    /// Policy with the given admission-check behavior.
    pub fn new(check: FailMode) -> Self {
        Self { check }
    }

    pub(crate) fn on_check_failure(&self, username: &str, error: &RateWardenError) -> bool {
        match self.check {
            FailMode::Open => {
                tracing::warn!(username, error = ?error, "rate limit check failed, allowing request");
                true
            }
            FailMode::Closed => {
                tracing::warn!(username, error = ?error, "rate limit check failed, rejecting request");
                false
            }
        }
    }

    pub(crate) fn on_record_failure(&self, username: &str, error: &RateWardenError) {
        tracing::error!(username, error = ?error, "failed to record usage");
    }

    pub(crate) fn on_stats_failure(
        &self,
        username: &str,
        error: &RateWardenError,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> UserStats {
        tracing::error!(username, error = ?error, "failed to read user stats");
        UserStats::degraded(config, now)
    }

    pub(crate) fn on_reset_failure(&self, username: &str, error: &RateWardenError) -> bool {
        tracing::error!(username, error = ?error, "failed to reset rate limits");
        false
    }

    pub(crate) fn on_global_stats_failure(
        &self,
        error: &RateWardenError,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> GlobalStats {
        tracing::error!(error = ?error, "failed to read global stats");
        GlobalStats::degraded(config, now)
    }

    pub(crate) fn on_cleanup_failure(&self, error: &RateWardenError) {
        tracing::error!(error = ?error, "cleanup sweep failed");
    }
}
