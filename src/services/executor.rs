//! Rotation-aware request execution
//!
//! [`ResilientExecutor`] runs an outbound operation and, when several
//! credentials are configured, retries it across the pool whenever the
//! failure looks like a credential problem (rejected, forbidden or rate
//! limited). Anything else is returned to the caller untouched.
//!
//! Retries are bounded by `max_rounds * pool size` attempts. Each round
//! after the first starts by clearing unhealthy flags, so a credential that
//! failed in one round is tried again in the next.

use std::future::Future;
use std::sync::Arc;

use super::credential_pool::CredentialPool;
use crate::error::RotationSignal;

/// Default number of full passes over the pool
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

/// Statuses that mean the credential was rejected or throttled
const ROTATION_STATUSES: [u16; 3] = [401, 403, 429];

/// Message fragments (lowercase) that indicate a credential problem
const ROTATION_PATTERNS: [&str; 6] = [
    "unauthorized",
    "forbidden",
    "rate limit",
    "quota exceeded",
    "token",
    "authentication",
];

/// Whether `err` should move the executor on to the next credential
pub fn should_rotate<E: RotationSignal + ?Sized>(err: &E) -> bool {
    if err
        .http_status()
        .is_some_and(|status| ROTATION_STATUSES.contains(&status))
    {
        return true;
    }

    let message = err.rotation_message().to_lowercase();
    ROTATION_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Runs operations with credential rotation on rejection
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    pool: Option<Arc<CredentialPool>>,
    max_rounds: u32,
}

impl ResilientExecutor {
    /// Executor over an optional pool; `None` disables rotation
    pub fn new(pool: Option<Arc<CredentialPool>>) -> Self {
        Self {
            pool,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Set the number of rounds (at least one)
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Whether failures will be retried across credentials
    pub fn is_rotating(&self) -> bool {
        self.pool.as_ref().is_some_and(|pool| pool.total_count() > 1)
    }

    /// Run `operation` with the configured number of rounds
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RotationSignal,
    {
        self.execute_with_rounds(operation, self.max_rounds).await
    }

    /// Run `operation`, rotating credentials on rotation-worthy failures
    ///
    /// With no pool or a single credential the operation runs exactly once
    /// and its outcome is returned as is. Otherwise every round tries each
    /// credential once, advancing round-robin after each rejected attempt. A
    /// failure that is not a credential problem aborts immediately. When all
    /// rounds are spent the last rejection is returned.
    pub async fn execute_with_rounds<T, E, F, Fut>(
        &self,
        mut operation: F,
        max_rounds: u32,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RotationSignal,
    {
        let pool = match &self.pool {
            Some(pool) if pool.total_count() > 1 => pool,
            _ => return operation().await,
        };

        let max_rounds = max_rounds.max(1);
        let total = pool.total_count();
        let mut last_error = None;

        for round in 0..max_rounds {
            if round > 0 {
                tracing::warn!(
                    round = round + 1,
                    max_rounds,
                    "Starting retry round"
                );
                pool.reset_all();
            }

            for _ in 0..total {
                let err = match operation().await {
                    Ok(value) => return Ok(value),
                    Err(err) => err,
                };

                if !should_rotate(&err) {
                    return Err(err);
                }

                tracing::warn!(
                    position = pool.current_index() + 1,
                    total,
                    round = round + 1,
                    max_rounds,
                    error = %err,
                    "Credential rejected, trying next"
                );
                pool.advance();
                last_error = Some(err);
            }

            tracing::warn!(round = round + 1, total, "All credentials failed in round");
        }

        tracing::error!(max_rounds, total, "All retry rounds exhausted");
        match last_error {
            Some(err) => Err(err),
            // total > 1 and max_rounds >= 1, so at least one attempt ran
            None => operation().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum FakeError {
        Http(u16, &'static str),
        Network(&'static str),
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                FakeError::Http(status, body) => write!(f, "HTTP {status}: {body}"),
                FakeError::Network(msg) => write!(f, "{msg}"),
            }
        }
    }

    impl RotationSignal for FakeError {
        fn http_status(&self) -> Option<u16> {
            match self {
                FakeError::Http(status, _) => Some(*status),
                FakeError::Network(_) => None,
            }
        }
    }

    fn pooled(tokens: &[&str]) -> (Arc<CredentialPool>, ResilientExecutor) {
        let pool = Arc::new(CredentialPool::new(tokens.iter().copied()).unwrap());
        let executor = ResilientExecutor::new(Some(pool.clone()));
        (pool, executor)
    }

    #[test]
    fn test_classification_by_status() {
        assert!(should_rotate(&FakeError::Http(401, "")));
        assert!(should_rotate(&FakeError::Http(403, "")));
        assert!(should_rotate(&FakeError::Http(429, "")));
        assert!(!should_rotate(&FakeError::Http(500, "boom")));
        assert!(!should_rotate(&FakeError::Http(404, "missing")));
    }

    #[test]
    fn test_classification_by_message() {
        assert!(should_rotate(&FakeError::Network("Request Unauthorized")));
        assert!(should_rotate(&FakeError::Network("RATE LIMIT reached")));
        assert!(should_rotate(&FakeError::Network("monthly quota exceeded")));
        assert!(should_rotate(&FakeError::Network("bad token")));
        assert!(should_rotate(&FakeError::Network("Authentication required")));
        assert!(should_rotate(&FakeError::Http(500, "Forbidden by policy")));
        assert!(!should_rotate(&FakeError::Network("operation timed out")));
    }

    #[test]
    fn test_classification_of_anyhow_chain() {
        let err = anyhow::Error::new(crate::error::UpstreamError::status(429, "slow down"))
            .context("chat request failed");
        assert!(should_rotate(&err));

        let other = anyhow::anyhow!("connection reset by peer");
        assert!(!should_rotate(&other));

        let wrapped = anyhow::anyhow!("401 Unauthorized").context("chat request failed");
        assert_eq!(wrapped.to_string(), "chat request failed");
        assert!(should_rotate(&wrapped));
    }

    #[tokio::test]
    async fn test_without_pool_runs_once() {
        let executor = ResilientExecutor::new(None);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Http(429, "slow down")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), FakeError::Http(429, "slow down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!executor.is_rotating());
    }

    #[tokio::test]
    async fn test_single_credential_pool_never_rotates() {
        let (pool, executor) = pooled(&["only"]);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Http(401, "bad credentials")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), FakeError::Http(401, "bad credentials"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.current_index(), 0);
        assert!(pool.current().last_used_at().is_none());
    }

    #[tokio::test]
    async fn test_always_rate_limited_exhausts_every_round() {
        let (pool, executor) = pooled(&["t1", "t2", "t3"]);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Http(429, "too many requests")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), FakeError::Http(429, "too many requests"));
        assert_eq!(calls.load(Ordering::SeqCst), DEFAULT_MAX_ROUNDS * 3);
        assert_eq!(pool.current_index(), 0);
    }

    #[tokio::test]
    async fn test_custom_round_count_bounds_attempts() {
        let (_pool, executor) = pooled(&["t1", "t2"]);
        let executor = executor.with_max_rounds(2);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Http(403, "")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_rounds_still_tries_each_credential() {
        let (_pool, executor) = pooled(&["t1", "t2"]);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute_with_rounds(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(FakeError::Http(401, "")) }
                },
                0,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_rotation_error_aborts_immediately() {
        let (pool, executor) = pooled(&["t1", "t2", "t3"]);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Network("operation timed out")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), FakeError::Network("operation timed out"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.current_index(), 0);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_credential() {
        let (pool, executor) = pooled(&["t1", "t2", "t3"]);
        let used = Mutex::new(Vec::new());

        let result = executor
            .execute(|| {
                let primary = pool.current().primary().to_string();
                used.lock().unwrap().push(primary.clone());
                async move {
                    if primary == "t3" {
                        Ok(primary)
                    } else {
                        Err(FakeError::Http(401, "bad credentials"))
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "t3");
        assert_eq!(*used.lock().unwrap(), vec!["t1", "t2", "t3"]);
        assert_eq!(pool.current_index(), 2);
    }

    #[tokio::test]
    async fn test_later_round_resets_health() {
        let (pool, executor) = pooled(&["t1", "t2"]);
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let pool = pool.clone();
                async move {
                    if n < 2 {
                        pool.mark_current_unhealthy();
                        Err(FakeError::Http(429, ""))
                    } else {
                        Ok(pool.available_count())
                    }
                }
            })
            .await;

        // Second round starts with reset_all, so both entries are healthy again
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
