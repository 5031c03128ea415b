use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;

use crate::RateLimitConfig;

/// `X-RateLimit-Limit` header name.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// `X-RateLimit-Remaining` header name.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// `X-RateLimit-Reset` header name.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
/// `X-RateLimit-Window` header name.
pub const HEADER_WINDOW: &str = "X-RateLimit-Window";

/// Cumulative and daily usage for one user.
///
/// Created on the first recorded request. Neither resets nor the cleanup
/// sweep remove it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    /// Every request ever recorded.
    pub total_requests: u64,
    /// Requests recorded since the start of the UTC day of `last_request`.
    pub requests_today: u64,
    /// First recorded request. Never changes once set.
    pub first_request: Option<DateTime<Utc>>,
    /// Most recent recorded request.
    pub last_request: Option<DateTime<Utc>>,
    /// UTC calendar date of `last_request`.
    #[serde(skip)]
    pub last_request_date: Option<NaiveDate>,
}

impl UsageStats {
    /// Account for one request made at `now`.
    pub(crate) fn record(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();

        if self.last_request_date != Some(today) {
            self.requests_today = 0;
        }

        self.total_requests = self.total_requests.saturating_add(1);
        self.requests_today = self.requests_today.saturating_add(1);
        self.first_request.get_or_insert(now);
        self.last_request = Some(now);
        self.last_request_date = Some(today);
    }
}

/// Quota and usage snapshot for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// Requests that still count against the current window.
    pub requests_in_current_window: u64,
    /// Requests left before the user is rejected.
    pub remaining_requests: u64,
    /// When the oldest in-window request stops counting.
    pub reset_time: DateTime<Utc>,
    /// Window length.
    pub window_size_seconds: u64,
    /// Requests allowed per window.
    pub limit_per_window: u64,
    /// See [`UsageStats::requests_today`].
    pub requests_today: u64,
    /// See [`UsageStats::total_requests`].
    pub total_requests: u64,
    /// See [`UsageStats::first_request`].
    pub first_request: Option<DateTime<Utc>>,
    /// See [`UsageStats::last_request`].
    pub last_request: Option<DateTime<Utc>>,
}

impl UserStats {
    pub(crate) fn new(
        config: &RateLimitConfig,
        requests_in_current_window: u64,
        reset_time: DateTime<Utc>,
        usage: UsageStats,
    ) -> Self {
        let limit = *config.requests_per_window;

        Self {
            requests_in_current_window,
            remaining_requests: limit.saturating_sub(requests_in_current_window),
            reset_time,
            window_size_seconds: *config.window_size_seconds,
            limit_per_window: limit,
            requests_today: usage.requests_today,
            total_requests: usage.total_requests,
            first_request: usage.first_request,
            last_request: usage.last_request,
        }
    }

    /// Stats for a user the store could not be asked about.
    ///
    /// Reports an untouched window: full quota, resetting now, no usage.
    pub fn degraded(config: &RateLimitConfig, now: DateTime<Utc>) -> Self {
        Self::new(config, 0, now, UsageStats::default())
    }

    /// The `X-RateLimit-*` response headers for this snapshot.
    pub fn rate_limit_headers(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (HEADER_LIMIT, self.limit_per_window.to_string()),
            (HEADER_REMAINING, self.remaining_requests.to_string()),
            (
                HEADER_RESET,
                self.reset_time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            (HEADER_WINDOW, self.window_size_seconds.to_string()),
        ])
    }
}

/// Aggregate view across all users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    /// Distinct users that have recorded at least one request.
    pub total_users: u64,
    /// Users with at least one request in the current window.
    pub active_users_in_window: u64,
    /// Sum of in-window requests over all users.
    pub total_requests_in_window: u64,
    /// Window length.
    pub window_size_seconds: u64,
    /// Requests allowed per window per user.
    pub limit_per_user: u64,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl GlobalStats {
    /// Zero-valued stats returned when the store could not be read.
    pub fn degraded(config: &RateLimitConfig, now: DateTime<Utc>) -> Self {
        Self {
            total_users: 0,
            active_users_in_window: 0,
            total_requests_in_window: 0,
            window_size_seconds: *config.window_size_seconds,
            limit_per_user: *config.requests_per_window,
            timestamp: now,
        }
    }
}
