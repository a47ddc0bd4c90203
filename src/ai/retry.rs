use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,
    /// Initial delay before first retry (in milliseconds)
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff (1.0 = fixed delay)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Fixed-delay profile: `attempts` total tries spaced `delay_ms` apart
    pub fn fixed(attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_retries: attempts.saturating_sub(1),
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }
}

/// Retry an async operation with backoff.
///
/// `is_retryable` decides per error whether another attempt is worthwhile;
/// non-retryable errors are returned immediately.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    mut operation: F,
    config: RetryConfig,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut last_error: Option<E> = None;
    let mut delay_ms = config.initial_delay_ms;

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    log::info!("Operation succeeded after {} retry attempts", attempt);
                }
                return Ok(result);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    log::warn!("Non-retryable error encountered: {}", error);
                    return Err(error);
                }

                if attempt >= config.max_retries {
                    log::warn!(
                        "Operation failed after {} attempts. Last error: {}",
                        attempt + 1,
                        error
                    );
                    last_error = Some(error);
                    break;
                }

                log::info!(
                    "Operation failed (attempt {}/{}): {}. Retrying in {}ms...",
                    attempt + 1,
                    config.max_retries + 1,
                    error,
                    delay_ms
                );

                last_error = Some(error);
                sleep(Duration::from_millis(delay_ms)).await;

                delay_ms = (delay_ms as f64 * config.backoff_multiplier) as u64;
                delay_ms = delay_ms.min(config.max_delay_ms);
            }
        }
    }

    Err(last_error.expect("loop always records an error before breaking"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.0,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(42)
                    }
                }
            },
            quick_config(3),
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
            quick_config(3),
            |_| false,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("attempt {}", n)) }
            },
            quick_config(2),
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap_err(), "attempt 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn fixed_profile_counts_total_attempts() {
        let cfg = RetryConfig::fixed(3, 2000);
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.initial_delay_ms, 2000);
        assert_eq!(cfg.backoff_multiplier, 1.0);
    }
}
