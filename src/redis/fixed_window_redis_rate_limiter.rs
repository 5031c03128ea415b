use std::{collections::HashSet, fmt, sync::Arc};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use redis::AsyncCommands;

use crate::{
    Clock, GlobalStats, RateLimitConfig, RateWardenError, UsageStats, UserStats,
    redis::{RedisConnection, RedisKey, RedisKeyGenerator, RedisRateLimiterOptions},
};

const SCAN_BATCH: u64 = 500;

type StatsRow = (u64, i64, String, String, String, String);

// KEYS: counter, stats hash, users set
// ARGV: window seconds, now (RFC 3339), today (YYYY-MM-DD), username
const RECORD_SCRIPT: &str = r#"
    local counter_key = KEYS[1]
    local stats_key = KEYS[2]
    local users_key = KEYS[3]

    local window_size_seconds = tonumber(ARGV[1])
    local now = ARGV[2]
    local today = ARGV[3]
    local username = ARGV[4]

    local count = redis.call("INCR", counter_key)
    if redis.call("TTL", counter_key) == -1 then
        redis.call("EXPIRE", counter_key, window_size_seconds)
    end

    if redis.call("HGET", stats_key, "last_request_date") ~= today then
        redis.call("HSET", stats_key, "requests_today", 0)
    end

    redis.call("HINCRBY", stats_key, "total_requests", 1)
    redis.call("HINCRBY", stats_key, "requests_today", 1)
    redis.call("HSET", stats_key, "last_request", now, "last_request_date", today)
    redis.call("HSETNX", stats_key, "first_request", now)
    redis.call("SADD", users_key, username)

    return count
"#;

// KEYS: counter, stats hash
const STATS_SCRIPT: &str = r#"
    local counter_key = KEYS[1]
    local stats_key = KEYS[2]

    local count = tonumber(redis.call("GET", counter_key)) or 0
    local ttl_ms = redis.call("PTTL", counter_key)
    local stats = redis.call("HMGET", stats_key, "total_requests", "requests_today", "first_request", "last_request")

    return {count, ttl_ms, stats[1] or "", stats[2] or "", stats[3] or "", stats[4] or ""}
"#;

/// Fixed-window limiter backed by a Redis TTL counter.
///
/// # Semantics
///
/// Every user has one counter that is created by the first recorded request
/// of a window and expires `window_size_seconds` later. All requests in that
/// period share the counter and are forgiven together when it expires; they do
/// not expire one by one as in
/// [`SlidingWindowLocalRateLimiter`](crate::local::SlidingWindowLocalRateLimiter).
/// In exchange state is O(1) per user, shared between processes and survives
/// restarts.
///
/// # Consistency
///
/// - `check_user_limit` is a single `GET` and never writes
/// - `record_usage` is one Lua script: counter increment, expiry and usage
///   hash update are atomic within Redis
/// - Every round trip is bounded by the configured timeout
///
/// # Keys
///
/// See [`RedisKey`] for prefix rules. With the default prefix:
/// `ratewarden:rate_limit:<user>`, `ratewarden:user_stats:<user>`,
/// `ratewarden:users`.
pub struct FixedWindowRedisRateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    connection: RedisConnection,
    key_generator: RedisKeyGenerator,
    record_script: redis::Script,
    stats_script: redis::Script,
}

impl FixedWindowRedisRateLimiter {
    /// Create a limiter. No connection is attempted until the first call.
    pub fn new(options: RedisRateLimiterOptions) -> Result<Self, RateWardenError> {
        let prefix = options.prefix.unwrap_or_else(RedisKey::default_prefix);

        Ok(Self {
            config: options.limits,
            clock: options.clock,
            connection: RedisConnection::open(&options.url, options.timeout)?,
            key_generator: RedisKeyGenerator::new(prefix),
            record_script: redis::Script::new(RECORD_SCRIPT),
            stats_script: redis::Script::new(STATS_SCRIPT),
        })
    } // end constructor

    /// Quota settings this limiter enforces.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Whether `username`'s counter is still below the limit. Read-only.
    pub async fn check_user_limit(&self, username: &str) -> Result<bool, RateWardenError> {
        let counter_key = self.key_generator.get_counter_key(username);

        let count = self
            .connection
            .bounded(async {
                let mut connection_manager = self.connection.get().await?;
                let count: Option<u64> = connection_manager.get(&counter_key).await?;

                Ok::<_, RateWardenError>(count.unwrap_or(0))
            })
            .await?;

        Ok(count < *self.config.requests_per_window)
    } // end method check_user_limit

    /// Increment `username`'s counter and usage hash.
    ///
    /// Returns the counter value after the increment.
    pub async fn record_usage(&self, username: &str) -> Result<u64, RateWardenError> {
        let now = self.clock.now();

        self.connection
            .bounded(async {
                let mut connection_manager = self.connection.get().await?;

                let count: u64 = self
                    .record_script
                    .key(self.key_generator.get_counter_key(username))
                    .key(self.key_generator.get_stats_key(username))
                    .key(&*self.key_generator.get_users_key())
                    .arg(*self.config.window_size_seconds)
                    .arg(now.to_rfc3339_opts(SecondsFormat::Micros, true))
                    .arg(now.date_naive().to_string())
                    .arg(username)
                    .invoke_async(&mut connection_manager)
                    .await?;

                Ok::<_, RateWardenError>(count)
            })
            .await
    } // end method record_usage

    /// Quota and usage snapshot for `username`.
    ///
    /// `reset_time` is when the counter expires, or now if there is none.
    pub async fn get_user_stats(&self, username: &str) -> Result<UserStats, RateWardenError> {
        let now = self.clock.now();

        let (count, ttl_ms, total, today, first, last) = self
            .connection
            .bounded(async {
                let mut connection_manager = self.connection.get().await?;

                let row: StatsRow = self
                    .stats_script
                    .key(self.key_generator.get_counter_key(username))
                    .key(self.key_generator.get_stats_key(username))
                    .invoke_async(&mut connection_manager)
                    .await?;

                Ok::<_, RateWardenError>(row)
            })
            .await?;

        let reset_time = if ttl_ms > 0 {
            now.checked_add_signed(TimeDelta::milliseconds(ttl_ms))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        } else {
            now
        };

        let usage = UsageStats {
            total_requests: parse_count("total_requests", &total)?,
            requests_today: parse_count("requests_today", &today)?,
            first_request: parse_timestamp("first_request", &first)?,
            last_request: parse_timestamp("last_request", &last)?,
            last_request_date: None,
        };

        Ok(UserStats::new(&self.config, count, reset_time, usage))
    } // end method get_user_stats

    /// Delete `username`'s counter. The usage hash is kept.
    pub async fn reset_user_limits(&self, username: &str) -> Result<bool, RateWardenError> {
        let counter_key = self.key_generator.get_counter_key(username);

        self.connection
            .bounded(async {
                let mut connection_manager = self.connection.get().await?;
                let _: u64 = connection_manager.del(&counter_key).await?;

                Ok::<_, RateWardenError>(true)
            })
            .await
    } // end method reset_user_limits

    /// Aggregate the live counters of every user recorded under this prefix.
    ///
    /// Walks the prefix's users set with `SSCAN` and reads each batch's
    /// counters with one `MGET`. Every round trip is bounded on its own, so
    /// the cost grows with this prefix's users, not with the database.
    pub async fn get_global_stats(&self) -> Result<GlobalStats, RateWardenError> {
        let users_key = self.key_generator.get_users_key();

        let total_users: u64 = self
            .connection
            .bounded(async {
                let mut connection_manager = self.connection.get().await?;
                let total_users: u64 = connection_manager.scard(&*users_key).await?;

                Ok::<_, RateWardenError>(total_users)
            })
            .await?;

        // SSCAN may return a member more than once
        let mut seen: HashSet<String> = HashSet::new();
        let mut live: Vec<u64> = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = self
                .connection
                .bounded(async {
                    let mut connection_manager = self.connection.get().await?;

                    let page: (u64, Vec<String>) = redis::cmd("SSCAN")
                        .arg(&*users_key)
                        .arg(cursor)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut connection_manager)
                        .await?;

                    Ok::<_, RateWardenError>(page)
                })
                .await?;

            let counter_keys: Vec<String> = batch
                .into_iter()
                .filter(|username| seen.insert(username.clone()))
                .map(|username| self.key_generator.get_counter_key(&username))
                .collect();

            if !counter_keys.is_empty() {
                let counts: Vec<Option<u64>> = self
                    .connection
                    .bounded(async {
                        let mut connection_manager = self.connection.get().await?;

                        let counts: Vec<Option<u64>> = redis::cmd("MGET")
                            .arg(&counter_keys)
                            .query_async(&mut connection_manager)
                            .await?;

                        Ok::<_, RateWardenError>(counts)
                    })
                    .await?;

                live.extend(counts.into_iter().flatten().filter(|c| *c > 0));
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(GlobalStats {
            total_users,
            active_users_in_window: live.len() as u64,
            total_requests_in_window: live.iter().sum(),
            window_size_seconds: *self.config.window_size_seconds,
            limit_per_user: *self.config.requests_per_window,
            timestamp: self.clock.now(),
        })
    } // end method get_global_stats

    /// Nothing to sweep: counters carry their own expiry.
    pub async fn cleanup_old_data(&self) -> Result<usize, RateWardenError> {
        let prefix: &str = self.key_generator.prefix();
        tracing::debug!(prefix, "redis counters expire natively, nothing to sweep");

        Ok(0)
    }
}

impl fmt::Debug for FixedWindowRedisRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedWindowRedisRateLimiter")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("connection", &self.connection)
            .field("key_generator", &self.key_generator)
            .finish_non_exhaustive()
    }
}

fn parse_count(field: &str, raw: &str) -> Result<u64, RateWardenError> {
    if raw.is_empty() {
        return Ok(0);
    }

    raw.parse()
        .map_err(|_| RateWardenError::InvalidStoredValue(format!("{field} = {raw:?}")))
}

fn parse_timestamp(field: &str, raw: &str) -> Result<Option<DateTime<Utc>>, RateWardenError> {
    if raw.is_empty() {
        return Ok(None);
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|_| RateWardenError::InvalidStoredValue(format!("{field} = {raw:?}")))
}
