//! Bounded retry with exponential backoff for part uploads.
//!
//! Presigned part PUTs are idempotent, so transient failures (transport
//! errors, 5xx responses) are safe to retry. Anything else fails the
//! attempt immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::error::UploadError;

/// Distinguishes failures worth another attempt from terminal ones.
pub enum RetryError {
    /// Transport errors and server-side (5xx) responses.
    Retryable(UploadError),
    /// Client-side rejections and malformed responses.
    NonRetryable(UploadError),
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per part, including the first one.
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay_ms: u64,
    /// Jitter added to each delay, as a fraction of it (0.25 = ±25%).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 500,
            jitter_factor: 0.25,
        }
    }
}

pub async fn with_retry<F, Fut, T>(func: F, config: &RetryConfig) -> Result<T, UploadError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let mut attempt = 0;
    loop {
        match func().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    return Err(err);
                }
                sleep(backoff_with_jitter(attempt - 1, config)).await;
            }
        }
    }
}

/// Backoff delay for a given attempt: `base_delay * 2^attempt`, with random
/// jitter to avoid synchronized retries.
fn backoff_with_jitter(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = config.base_delay_ms * 2u64.pow(attempt);
    let jitter_range = (base_delay as f64 * config.jitter_factor) as u64;
    let jitter = rand::rng().random_range(0..=jitter_range * 2) as i64 - jitter_range as i64;
    let delay_ms = (base_delay as i64 + jitter).max(0) as u64;
    Duration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            jitter_factor: 0.25,
        }
    }

    #[test]
    fn backoff_doubles_within_jitter_bounds() {
        let config = RetryConfig {
            max_attempts: 4,
            base_delay_ms: 100,
            jitter_factor: 0.25,
        };
        for attempt in 0..4 {
            let base = 100 * 2u64.pow(attempt);
            let delay = backoff_with_jitter(attempt, &config).as_millis() as u64;
            assert!(delay >= base - base / 4);
            assert!(delay <= base + base / 4);
        }
    }

    #[tokio::test]
    async fn retryable_errors_exhaust_all_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), UploadError> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(RetryError::Retryable(UploadError::PartUpload {
                        part_number: 7,
                        reason: "503".to_string(),
                    }))
                }
            },
            &fast_config(3),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().part_number(), Some(7));
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), UploadError> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(RetryError::NonRetryable(UploadError::PartUpload {
                        part_number: 2,
                        reason: "403".to_string(),
                    }))
                }
            },
            &fast_config(3),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn success_after_a_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry(
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(RetryError::Retryable(UploadError::Transfer(
                            "connection reset".to_string(),
                        )))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            &fast_config(3),
        )
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
