//! Bounded retries with a fixed backoff.
//!
//! The system clipboard has no cross-process lock we can take, so contention
//! with other applications is absorbed here: a small number of attempts with a
//! short sleep between them, then the error is handed back to the caller.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Default number of attempts for clipboard and key-injection calls
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between two attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(50);

/// Retry policy for a single I/O boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    /// Sleep after each failed attempt that will be followed by another one
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

/// Run `operation` until it succeeds or `config.max_attempts` is exhausted.
///
/// Every failed attempt except the last is followed by `config.backoff`.
/// The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    log::debug!("Retry: succeeded on attempt {}/{}", attempt, attempts);
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                log::debug!(
                    "Retry: attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    config.backoff
                );
                tokio::time::sleep(config.backoff).await;
                attempt += 1;
            }
            Err(e) => {
                log::warn!("Retry: giving up after {} attempts: {}", attempts, e);
                return Err(e);
            }
        }
    }
}
