use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use crate::{
    Clock, GlobalStats, RateLimitConfig, UsageStats, UserStats,
    local::{LocalRateLimiterOptions, UsageTracker},
};

/// Request timestamps for one user, oldest first.
#[derive(Debug, Default)]
pub(crate) struct RateWindow {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl RateWindow {
    pub(crate) fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn oldest(&self) -> Option<DateTime<Utc>> {
        self.timestamps.front().copied()
    }

    fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        matches!(self.timestamps.front(), Some(oldest) if *oldest < cutoff)
    }

    /// Drop every timestamp strictly older than `cutoff`.
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while let Some(oldest) = self.timestamps.front()
            && *oldest < cutoff
        {
            self.timestamps.pop_front();
        }
    }

    fn push(&mut self, now: DateTime<Utc>) {
        // keep the sequence non-decreasing if the wall clock steps back
        let timestamp = match self.timestamps.back() {
            Some(last) if *last > now => *last,
            _ => now,
        };

        self.timestamps.push_back(timestamp);
    }

    fn clear(&mut self) {
        self.timestamps.clear();
    }
}

/// True sliding-window limiter for in-process use.
///
/// Every recorded request keeps counting against its user for exactly
/// `window_size_seconds`, independently of the other requests.
///
/// # Algorithm
///
/// 1. **Window:** per-user deque of request timestamps
/// 2. **Admission check:** drop timestamps older than `now - window`, allow if
///    fewer than `requests_per_window` remain
/// 3. **Record:** push `now` onto the deque and bump the user's usage counters
/// 4. **Sweep:** drop timestamps older than `now - 2 * window`, free empty deques
///
/// Checking never records. Callers check before expensive work and record only
/// once the work has succeeded.
///
/// # Thread Safety
///
/// - Uses [`DashMap`](dashmap::DashMap) for concurrent key access
/// - Writers to one user are serialized by the shard lock; different users
///   proceed independently
///
/// # Memory
///
/// Windows are pruned lazily and only deallocated by [`Self::cleanup_old_data`].
/// Usage statistics are kept for every user ever recorded.
#[derive(Debug)]
pub struct SlidingWindowLocalRateLimiter {
    config: RateLimitConfig,
    window: TimeDelta,
    sweep_cutoff: TimeDelta,
    clock: Arc<dyn Clock>,
    windows: DashMap<String, RateWindow>,
    usage: UsageTracker,
}

impl SlidingWindowLocalRateLimiter {
    /// Create a limiter with empty state.
    pub fn new(options: LocalRateLimiterOptions) -> Self {
        let config = options.limits;

        Self {
            window: config.window_size_seconds.as_time_delta(),
            sweep_cutoff: config.window_size_seconds.sweep_cutoff(),
            config,
            clock: options.clock,
            windows: DashMap::new(),
            usage: UsageTracker::new(),
        }
    } // end constructor

    #[cfg(test)]
    pub(crate) fn windows(&self) -> &DashMap<String, RateWindow> {
        &self.windows
    }

    /// Quota settings this limiter enforces.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Whether `username` may make another request right now.
    ///
    /// Prunes the user's window to `now - window_size` and compares what is
    /// left with the limit. Does not record the request.
    pub fn check_user_limit(&self, username: &str) -> bool {
        let now = self.clock.now();
        let in_window = self.prune_window(username, cutoff(now, self.window));

        in_window < *self.config.requests_per_window
    } // end method check_user_limit

    /// Count one request for `username` at the current time.
    ///
    /// Not idempotent: every call counts.
    pub fn record_usage(&self, username: &str) {
        let now = {
            let mut window = self.windows.entry(username.to_string()).or_default();
            let now = self.clock.now();
            window.push(now);
            now
        };

        self.usage.record(username, now);
    } // end method record_usage

    /// Quota and usage snapshot for `username`.
    pub fn get_user_stats(&self, username: &str) -> UserStats {
        let now = self.clock.now();
        self.prune_window(username, cutoff(now, self.window));

        let (in_window, oldest) = match self.windows.get(username) {
            Some(window) => (window.len() as u64, window.oldest()),
            None => (0, None),
        };

        let reset_time = oldest.map_or(now, |oldest| {
            oldest
                .checked_add_signed(self.window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        UserStats::new(&self.config, in_window, reset_time, self.usage.get(username))
    } // end method get_user_stats

    /// Usage counters for `username` without touching its window.
    pub fn get_usage(&self, username: &str) -> UsageStats {
        self.usage.get(username)
    }

    /// Empty `username`'s window. Usage statistics are left untouched.
    pub fn reset_user_limits(&self, username: &str) -> bool {
        if let Some(mut window) = self.windows.get_mut(username) {
            window.clear();
        }

        true
    } // end method reset_user_limits

    /// Aggregate quota usage over every tracked user.
    pub fn get_global_stats(&self) -> GlobalStats {
        let now = self.clock.now();
        let cutoff = cutoff(now, self.window);

        let mut active_users_in_window = 0u64;
        let mut total_requests_in_window = 0u64;

        for mut window in self.windows.iter_mut() {
            window.prune(cutoff);

            if !window.is_empty() {
                active_users_in_window += 1;
                total_requests_in_window += window.len() as u64;
            }
        }

        GlobalStats {
            total_users: self.usage.user_count() as u64,
            active_users_in_window,
            total_requests_in_window,
            window_size_seconds: *self.config.window_size_seconds,
            limit_per_user: *self.config.requests_per_window,
            timestamp: now,
        }
    } // end method get_global_stats

    /// Drop timestamps older than twice the window and free emptied windows.
    ///
    /// Returns the number of windows removed.
    pub fn cleanup_old_data(&self) -> usize {
        let cutoff = cutoff(self.clock.now(), self.sweep_cutoff);
        let before = self.windows.len();

        self.windows.retain(|_, window| {
            window.prune(cutoff);
            !window.is_empty()
        });

        before.saturating_sub(self.windows.len())
    } // end method cleanup_old_data

    /// Prune `username`'s window and return how many requests remain in it.
    ///
    /// Only takes the write lock when the oldest entry is actually stale.
    fn prune_window(&self, username: &str, cutoff: DateTime<Utc>) -> u64 {
        let Some(window) = self.windows.get(username) else {
            return 0;
        };

        if !window.is_stale(cutoff) {
            return window.len() as u64;
        }

        drop(window);

        let Some(mut window) = self.windows.get_mut(username) else {
            return 0;
        };

        window.prune(cutoff);
        window.len() as u64
    } // end method prune_window
} // end of impl

fn cutoff(now: DateTime<Utc>, span: TimeDelta) -> DateTime<Utc> {
    now.checked_sub_signed(span)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
