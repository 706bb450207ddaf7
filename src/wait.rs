//! Bounded polling waits.
//!
//! A single generic poll-until-timeout routine replaces ad hoc wait-condition
//! types: any closure returning `Ok(Some(value))` when the awaited state is
//! reached can be waited on.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{DriverError, Result};

/// Default interval between predicate polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Polls `check` until it yields a value or `timeout` elapses.
///
/// The predicate is always evaluated at least once, so a zero timeout still
/// observes the current state. Predicate errors propagate immediately; only
/// `Ok(None)` keeps the wait going. On expiry fails with
/// [`DriverError::TimeoutExceeded`].
pub async fn wait_until<T, F, Fut>(timeout: Duration, poll_interval: Duration, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        if started.elapsed() >= timeout {
            return Err(DriverError::TimeoutExceeded(timeout));
        }
        tokio::time::sleep(poll_interval).await;
    }
}
