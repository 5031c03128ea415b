#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod rate_limiter;
pub use rate_limiter::*;

pub mod local;

#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub mod redis;

pub mod config;
pub use config::BackendKind;
#[cfg(feature = "redis")]
pub use config::RedisSettings;

mod error;
pub use error::*;

mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

mod common;
pub use common::{
    CleanupIntervalSeconds, FailMode, RateLimitConfig, RequestsPerWindow, WindowSizeSeconds,
};

mod policy;
pub use policy::FailurePolicy;

mod stats;
pub use stats::{
    GlobalStats, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET, HEADER_WINDOW, UsageStats,
    UserStats,
};

mod runtime;

#[cfg(test)]
mod tests;
