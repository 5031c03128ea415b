use std::{future::Future, time::Duration};

use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{Interval, MissedTickBehavior},
};

use crate::RateWardenError;

pub(crate) fn new_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    // a slow sweep should push the next one back, not trigger a burst
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

pub(crate) fn spawn_task<F>(fut: F) -> Result<JoinHandle<()>, RateWardenError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle =
        Handle::try_current().map_err(|err| RateWardenError::RuntimeUnavailable(err.to_string()))?;

    Ok(handle.spawn(fut))
}

pub(crate) async fn tick(interval: &mut Interval) {
    interval.tick().await;
}
