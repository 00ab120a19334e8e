//! Bounded retry with exponential backoff.
//!
//! Used at startup while the database may still be coming up. Unlike a
//! reconnect loop this gives up after a fixed number of attempts and returns
//! the last error.

use std::future::Future;
use std::time::Duration;

/// Tunable parameters for [`with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Next backoff delay, clamped to [`RetryConfig::max_delay`].
pub fn next_delay(current: Duration, config: &RetryConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Run `op` until it succeeds or `config.max_attempts` is exhausted.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                tracing::error!(attempt, error = %e, "Giving up after {attempt} attempts");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt {attempt} failed, retrying",
                );
            }
        }

        tokio::time::sleep(delay).await;
        delay = next_delay(delay, config);
    }
}
