use std::{fmt, future::Future, time::Duration};

use redis::{Client, aio::ConnectionManager};
use tokio::sync::OnceCell;

use crate::{RateWardenError, redis::RedisTimeoutMs};

/// Lazily connected Redis handle with a bounded round trip.
///
/// The [`ConnectionManager`] is created on first use rather than at
/// construction, so a limiter can be built while Redis is still down. Until a
/// connection succeeds every operation fails and goes through the failure
/// policy; later calls try to connect again.
pub struct RedisConnection {
    client: Client,
    manager: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisConnection {
    /// Parse `url` and prepare a lazily connected handle.
    ///
    /// Fails only when `url` is malformed; no I/O happens here.
    pub fn open(url: &str, timeout: RedisTimeoutMs) -> Result<Self, RateWardenError> {
        Ok(Self {
            client: Client::open(url)?,
            manager: OnceCell::new(),
            timeout: timeout.as_duration(),
        })
    }

    /// The per-operation bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A cheap clone of the shared connection manager, connecting if needed.
    pub(crate) async fn get(&self) -> Result<ConnectionManager, RateWardenError> {
        let manager = self
            .manager
            .get_or_try_init(|| self.client.get_connection_manager())
            .await?;

        Ok(manager.clone())
    } // end method get

    /// Run `operation`, failing with [`RateWardenError::StoreTimeout`] if it
    /// has not finished within the configured bound.
    pub(crate) async fn bounded<T, F>(&self, operation: F) -> Result<T, RateWardenError>
    where
        F: Future<Output = Result<T, RateWardenError>>,
    {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(RateWardenError::StoreTimeout(self.timeout)),
        }
    } // end method bounded
}

impl fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnection")
            .field("client", &self.client)
            .field("connected", &self.manager.initialized())
            .field("timeout", &self.timeout)
            .finish()
    }
}
