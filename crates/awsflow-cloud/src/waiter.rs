//! Status polling with exponential backoff
//!
//! Used by adapters whose remote objects settle asynchronously (an EKS
//! cluster goes CREATING -> ACTIVE). The wait is bounded by the
//! operation's remaining time.

use crate::error::{CloudError, Result};
use crate::provider::RetryConfig;
use crate::schema::format_duration;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// What a single poll observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitStatus<T> {
    /// Target state reached
    Ready(T),
    /// Still transitioning; the current status for the log
    Pending(String),
    /// Terminal failure; the wait stops with an error
    Failed(String),
}

/// Polls until `poll` reports [`WaitStatus::Ready`]
///
/// # Returns
/// * `Ok(T)` - the value carried by `Ready`
/// * `Err(CloudError::Timeout)` - `timeout` elapsed first
/// * `Err(CloudError::ApiError)` - `poll` reported `Failed`
pub async fn wait_until<T, F, Fut>(
    what: &str,
    retry: &RetryConfig,
    timeout: Option<Duration>,
    mut poll: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WaitStatus<T>>>,
{
    let polling = async {
        let mut attempt = 0u32;
        loop {
            match poll().await? {
                WaitStatus::Ready(value) => return Ok(value),
                WaitStatus::Failed(status) => {
                    return Err(CloudError::api(
                        format!("waiting for {}", what),
                        format!("unexpected state '{}'", status),
                    ));
                }
                WaitStatus::Pending(status) => {
                    tracing::debug!("{} is {}, waiting", what, status);
                }
            }

            sleep(retry.delay_for_attempt(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, polling).await.map_err(|_| {
            CloudError::Timeout(format!(
                "waiting for {} (timeout: {})",
                what,
                format_duration(limit)
            ))
        })?,
        None => polling.await,
    }
}
