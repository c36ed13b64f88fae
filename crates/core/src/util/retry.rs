//! Exponential backoff for calls to remote coaching services.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    /// Fraction of each delay added as random jitter, in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
            ..Default::default()
        }
    }

    /// Delay before the retry that follows `attempt` (1-based), without jitter.
    fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exp);
        Duration::from_millis(ms.min(self.max_delay.as_millis() as f64) as u64)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let extra = base.mul_f64(rand::rng().random_range(0.0..=jitter));
        (base + extra).min(self.max_delay)
    }
}

/// Runs `f` until it succeeds, `is_retryable` rejects the error, or attempts run out.
/// The error of the last attempt is returned.
pub async fn retry_with_backoff<F, T, E, Fut>(
    config: &RetryConfig,
    mut f: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < max_attempts && is_retryable(&err) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(attempt, max_attempts, ?delay, "request failed, retrying");
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Request timeout, rate limiting and server errors.
pub fn is_http_retryable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially() {
        let config = RetryConfig::new(5, Duration::from_millis(100));
        assert_eq!(config.base_delay(1), Duration::from_millis(100));
        assert_eq!(config.base_delay(2), Duration::from_millis(200));
        assert_eq!(config.base_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 10.0,
            max_delay: Duration::from_secs(1),
            jitter: 0.5,
        };
        assert_eq!(config.base_delay(5), Duration::from_secs(1));
        assert!(config.delay_for_attempt(5) <= Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_fraction() {
        let config = RetryConfig {
            jitter: 0.25,
            ..RetryConfig::new(3, Duration::from_millis(400))
        };
        for _ in 0..50 {
            let d = config.delay_for_attempt(1);
            assert!(d >= Duration::from_millis(400) && d <= Duration::from_millis(500));
        }
    }

    #[test]
    fn retryable_statuses() {
        for s in [408, 429, 500, 502, 503, 599] {
            assert!(is_http_retryable(s), "{s}");
        }
        for s in [200, 400, 401, 403, 404] {
            assert!(!is_http_retryable(s), "{s}");
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let out: Result<u32, &str> = retry_with_backoff(
            &RetryConfig::immediate(5),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("busy")
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(out, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let out: Result<(), &str> = retry_with_backoff(
            &RetryConfig::immediate(5),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("unauthorized")
            },
            |e| *e != "unauthorized",
        )
        .await;
        assert_eq!(out, Err("unauthorized"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let out: Result<(), u32> = retry_with_backoff(
            &RetryConfig::immediate(3),
            || async { Err(calls.fetch_add(1, Ordering::SeqCst) + 1) },
            |_| true,
        )
        .await;
        assert_eq!(out, Err(3));
    }
}
