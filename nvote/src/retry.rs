use std::{thread::sleep, time::Duration};

use tracing::{error, warn};

use common::error::{Error, ErrorKind::Timeout};

use crate::config::RetryConfig;

pub enum RetryError {
    Failure(Error),
    Retry(Error),
}

/// Sorts an error by [`ErrorKind::is_retryable`](common::error::ErrorKind::is_retryable).
pub fn classify(e: Error) -> RetryError {
    if e.kind().is_retryable() {
        RetryError::Retry(e)
    } else {
        RetryError::Failure(e)
    }
}

/// Calls `operation` until it succeeds, fails for good, or runs out of attempts.
///
/// Sleeps between attempts, multiplying the delay by `backoff_factor` up to
/// `max_interval_ms`. Exhausting `max_attempts` yields `Timeout`.
pub fn retry_with_backoff<T, F>(config: &RetryConfig, mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Result<T, RetryError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut current_attempt = 1;
    let mut delay_ms = config.interval_ms;

    loop {
        match operation() {
            Ok(out) => return Ok(out),
            Err(RetryError::Retry(e)) => {
                if current_attempt >= max_attempts {
                    error!(attempts = max_attempts, %e, "giving up");
                    return Err(Error::with_chain(e, Timeout(max_attempts)));
                }

                warn!(
                    "Attempt {}/{} failed, retrying in {}ms: {}",
                    current_attempt, max_attempts, delay_ms, e
                );

                sleep(Duration::from_millis(delay_ms));
                current_attempt += 1;
                delay_ms = delay_ms
                    .saturating_mul(config.backoff_factor as u64)
                    .min(config.max_interval_ms);
            }
            Err(RetryError::Failure(e)) => {
                error!(%e, "failure, returning to caller");
                return Err(e);
            }
        }
    }
}
