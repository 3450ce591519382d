//! Exponential backoff for transient upstream failures
//!
//! Used around the session-token exchange, where a 5xx or a dropped
//! connection says nothing about the credential itself. Credential
//! rejections are handled by rotation in `services::executor`, not here.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial attempt)
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for a single delay
    pub max_delay: Duration,

    /// Multiplier applied per attempt
    pub multiplier: f64,

    /// Add up to one extra delay worth of random jitter
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        let delay_ms = if self.use_jitter && delay_ms > 0.0 {
            delay_ms + rand::thread_rng().gen_range(0.0..delay_ms)
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms as u64)
    }
}

/// Outcome of a retried operation
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or last error)
    pub result: Result<T, E>,

    /// Number of attempts made
    pub attempts: u32,

    /// Total time spent sleeping between attempts
    pub total_delay: Duration,
}

/// Run `operation` until it succeeds, fails with a non-retryable error,
/// or the retry budget in `config` is spent
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    config: &RetryConfig,
    is_retryable: R,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempts = 0;
    let mut total_delay = Duration::ZERO;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts,
                    total_delay,
                };
            }
            Err(err) => {
                if attempts > config.max_retries || !is_retryable(&err) {
                    return RetryResult {
                        result: Err(err),
                        attempts,
                        total_delay,
                    };
                }

                let delay = config.calculate_delay(attempts - 1);
                total_delay += delay;

                tracing::debug!(
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after transient failure"
                );

                sleep(delay).await;
            }
        }
    }
}

/// Retry presets
pub mod presets {
    use super::*;

    /// Session-token exchange: a few quick retries, the refresh timer
    /// covers anything longer
    pub fn token_exchange() -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(2)
            .with_initial_delay(Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(2))
            .with_multiplier(2.0)
            .with_jitter(true)
    }

    /// Single attempt
    pub fn no_retry() -> RetryConfig {
        RetryConfig::new().with_max_retries(0)
    }
}
