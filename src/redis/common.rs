use std::{ops::Deref, sync::Arc, time::Duration};

use crate::RateWardenError;

/// A validated newtype for Redis key prefixes.
///
/// This is a string with the following constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
/// - Must not contain colons or glob metacharacters (`*`, `?`, `[`, `]`)
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash, Eq)]
pub struct RedisKey(Arc<str>);

impl RedisKey {
    /// Create a new default prefix.
    pub fn default_prefix() -> Self {
        Self(Arc::from("ratewarden"))
    }
}

impl Deref for RedisKey {
    type Target = Arc<str>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for RedisKey {
    type Error = RateWardenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(RateWardenError::InvalidRedisKey(
                "Redis key must not be empty".to_string(),
            ))
        } else if value.len() > 255 {
            Err(RateWardenError::InvalidRedisKey(
                "Redis key must not be longer than 255 characters".to_string(),
            ))
        } else if value.contains(':') {
            Err(RateWardenError::InvalidRedisKey(
                "Redis key must not contain colons".to_string(),
            ))
        } else if value.contains(['*', '?', '[', ']']) {
            Err(RateWardenError::InvalidRedisKey(
                "Redis key must not contain glob characters".to_string(),
            ))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

/// Upper bound on a single Redis round trip, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RedisTimeoutMs(u64);

impl RedisTimeoutMs {
    /// The bound as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl Default for RedisTimeoutMs {
    /// Returns a bound of 250 ms.
    fn default() -> Self {
        Self(250)
    }
}

impl Deref for RedisTimeoutMs {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for RedisTimeoutMs {
    type Error = RateWardenError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(RateWardenError::InvalidRedisTimeout(
                "Redis timeout must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Builds the keys one prefix owns.
///
/// - `<prefix>:rate_limit:<username>`: fixed-window counter with a TTL
/// - `<prefix>:user_stats:<username>`: usage hash
/// - `<prefix>:users`: set of every username ever recorded
#[derive(Clone, Debug)]
pub(crate) struct RedisKeyGenerator {
    prefix: RedisKey,
    users_key: Arc<str>,
}

impl RedisKeyGenerator {
    pub(crate) fn new(prefix: RedisKey) -> Self {
        let users_key: Arc<str> = Arc::from(format!("{}:users", *prefix));

        Self {
            prefix,
            users_key,
        }
    }

    pub(crate) fn prefix(&self) -> &RedisKey {
        &self.prefix
    }

    pub(crate) fn get_counter_key(&self, username: &str) -> String {
        format!("{}:rate_limit:{}", *self.prefix, username)
    }

    pub(crate) fn get_stats_key(&self, username: &str) -> String {
        format!("{}:user_stats:{}", *self.prefix, username)
    }

    pub(crate) fn get_users_key(&self) -> Arc<str> {
        self.users_key.clone()
    }
}
