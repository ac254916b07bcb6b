//! Bounded retry for provider calls
//!
//! A fixed pause between a bounded number of attempts, so a judge pass is
//! scheduled the same way every time it runs.

use std::time::Duration;

/// Attempt budget and the pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts including the first (at least 1)
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryConfig {
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Run `operation` until it succeeds or the attempt budget is spent.
///
/// The error of the last attempt is returned on exhaustion.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= config.max_attempts => return Err(e),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = config.delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(config.delay).await;
            }
        }
    }
}
