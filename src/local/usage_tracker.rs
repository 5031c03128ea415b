use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::UsageStats;

/// Per-user cumulative and daily counters held in memory.
///
/// Updates for one user are serialized by the map's shard lock, so concurrent
/// `record` calls never lose an increment.
#[derive(Debug, Default)]
pub(crate) struct UsageTracker {
    stats: DashMap<String, UsageStats>,
}

impl UsageTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Count one request for `username` made at `now`.
    pub(crate) fn record(&self, username: &str, now: DateTime<Utc>) {
        if let Some(mut usage) = self.stats.get_mut(username) {
            usage.record(now);
            return;
        }

        self.stats
            .entry(username.to_string())
            .or_default()
            .record(now);
    }

    /// Usage for `username`, or all-zero stats for a user never recorded.
    pub(crate) fn get(&self, username: &str) -> UsageStats {
        self.stats
            .get(username)
            .map(|usage| usage.clone())
            .unwrap_or_default()
    }

    /// Number of distinct users ever recorded.
    pub(crate) fn user_count(&self) -> usize {
        self.stats.len()
    }
}
