//! Bounded retry for provider requests

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use twinroute_core::ProviderError;

/// Retry an async operation with a fixed delay between attempts.
///
/// Only errors for which `should_retry` returns `true` are retried; any other
/// error is returned immediately. `attempts` counts the first try.
pub async fn retry_async<F, Fut, T, E, P>(
    mut op: F,
    attempts: u32,
    delay: Duration,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts && should_retry(&e) => {
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Retry provider reads that failed at the transport level
pub async fn retry_transient<F, Fut, T>(op: F, attempts: u32, delay: Duration) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    retry_async(op, attempts, delay, ProviderError::is_transient).await
}
