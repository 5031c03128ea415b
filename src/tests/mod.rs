mod common;

mod test_common_validation;
mod test_config;
#[cfg(feature = "redis")]
mod test_redis_failure_policy;
