use std::{ops::Deref, str::FromStr, time::Duration};

use chrono::TimeDelta;

use crate::RateWardenError;

/// Maximum number of requests a user may make inside one window.
///
/// Must be greater than 0. Defaults to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestsPerWindow(u64);

impl Default for RequestsPerWindow {
    /// Returns a limit of 100 requests.
    fn default() -> Self {
        Self(100)
    }
}

impl Deref for RequestsPerWindow {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for RequestsPerWindow {
    type Error = RateWardenError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(RateWardenError::InvalidRequestsPerWindow(
                "Requests per window must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Length of the rolling window, in seconds.
///
/// Must be at least 1, and twice the window (the sweep cutoff) must still be
/// representable as a [`TimeDelta`]. Defaults to 3600.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowSizeSeconds(u64);

impl WindowSizeSeconds {
    /// The window as a signed duration.
    pub fn as_time_delta(&self) -> TimeDelta {
        // validated in `try_from`
        TimeDelta::try_seconds(self.0 as i64).unwrap_or(TimeDelta::MAX)
    }

    /// Twice the window; the cutoff used by the cleanup sweep.
    pub fn sweep_cutoff(&self) -> TimeDelta {
        self.as_time_delta()
            .checked_mul(2)
            .unwrap_or(TimeDelta::MAX)
    }
}

impl Default for WindowSizeSeconds {
    /// Returns a window of one hour.
    fn default() -> Self {
        Self(3600)
    }
}

impl Deref for WindowSizeSeconds {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for WindowSizeSeconds {
    type Error = RateWardenError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            return Err(RateWardenError::InvalidWindowSize(
                "Window size must be at least 1".to_string(),
            ));
        }

        let representable = i64::try_from(value)
            .ok()
            .and_then(|secs| secs.checked_mul(2))
            .and_then(TimeDelta::try_seconds)
            .is_some();

        if !representable {
            return Err(RateWardenError::InvalidWindowSize(
                "Window size is too large".to_string(),
            ));
        }

        Ok(Self(value))
    }
}

/// Period between two runs of the cleanup sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CleanupIntervalSeconds(u64);

impl CleanupIntervalSeconds {
    /// The interval as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for CleanupIntervalSeconds {
    /// Returns an interval of five minutes.
    fn default() -> Self {
        Self(300)
    }
}

impl Deref for CleanupIntervalSeconds {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for CleanupIntervalSeconds {
    type Error = RateWardenError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(RateWardenError::InvalidCleanupInterval(
                "Cleanup interval must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// What `check_user_limit` answers when the backing store fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailMode {
    /// Let the request through.
    #[default]
    Open,
    /// Reject the request.
    Closed,
}

impl FromStr for FailMode {
    type Err = RateWardenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(RateWardenError::InvalidConfig {
                name: "RATE_LIMIT_FAIL_MODE",
                reason: format!("expected `open` or `closed`, got `{other}`"),
            }),
        }
    }
}

/// Immutable process-wide quota settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per window per user.
    pub requests_per_window: RequestsPerWindow,
    /// Window length.
    pub window_size_seconds: WindowSizeSeconds,
}

impl RateLimitConfig {
    /// Validate and build a config from raw numbers.
    pub fn new(requests_per_window: u64, window_size_seconds: u64) -> Result<Self, RateWardenError> {
        Ok(Self {
            requests_per_window: RequestsPerWindow::try_from(requests_per_window)?,
            window_size_seconds: WindowSizeSeconds::try_from(window_size_seconds)?,
        })
    }
}
