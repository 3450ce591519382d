//! Session-token refresh scheduling
//!
//! [`RefreshScheduler`] keeps the derived credential of every primary
//! credential fresh. In pool mode a run walks the whole pool, marking
//! entries whose exchange fails as unhealthy without stopping the walk. In
//! single mode a run performs one exchange. Either way the scheduler re-arms
//! itself shortly before the soonest reported refresh time, and a failed run
//! is logged and retried on the next tick.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::credential_pool::CredentialPool;
use super::exchange::CredentialExchange;
use super::facade::CredentialFacade;
use crate::error::RefreshError;

/// Scheduling parameters
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval used when no exchange in a run reported one
    pub default_refresh_in: Duration,
    /// How long before the reported refresh time to run
    pub lead: Duration,
    /// Lower bound for the delay between runs
    pub min_delay: Duration,
    /// Log session tokens in clear text
    pub show_token: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            default_refresh_in: Duration::from_secs(1800),
            lead: Duration::from_secs(60),
            min_delay: Duration::from_secs(10),
            show_token: false,
        }
    }
}

/// Now plus `secs`, saturating at the latest representable time
fn expiry_after(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Periodically re-derives session credentials
pub struct RefreshScheduler {
    facade: Arc<dyn CredentialFacade>,
    exchange: Arc<dyn CredentialExchange>,
    config: RefreshConfig,
}

impl RefreshScheduler {
    pub fn new(
        facade: Arc<dyn CredentialFacade>,
        exchange: Arc<dyn CredentialExchange>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            facade,
            exchange,
            config,
        }
    }

    /// Delay before the next run for a reported refresh interval
    pub fn next_delay(&self, refresh_in: Duration) -> Duration {
        refresh_in
            .saturating_sub(self.config.lead)
            .max(self.config.min_delay)
    }

    /// Run one refresh in whichever mode is configured
    ///
    /// Returns the interval after which the credentials should be refreshed
    /// again. Only single mode can fail; pool mode degrades per entry.
    pub async fn refresh(&self) -> Result<Duration, RefreshError> {
        match self.facade.pool() {
            Some(pool) => Ok(self.refresh_pool(pool).await),
            None => self.refresh_single().await,
        }
    }

    /// Exchange every primary credential in the pool
    ///
    /// Starts at the current entry and advances after each success. A failed
    /// exchange marks its entry unhealthy, which already moves on to the next
    /// healthy entry. Finishes by rotating to a healthy entry and returns the
    /// smallest refresh interval reported by a successful exchange.
    pub async fn refresh_pool(&self, pool: &CredentialPool) -> Duration {
        let total = pool.total_count();
        let mut soonest: Option<u64> = None;

        tracing::info!(total, "Refreshing session tokens");

        for step in 0..total {
            let (index, entry) = pool.current_with_index();
            let primary = entry.primary().to_string();

            match self.exchange.exchange(&primary).await {
                Ok(derived) => {
                    let expires_at = expiry_after(derived.refresh_in);
                    if self.config.show_token {
                        tracing::info!(position = index + 1, token = %derived.token, "Session token");
                    }
                    pool.set_derived_at(index, derived.token, expires_at);
                    soonest = Some(soonest.map_or(derived.refresh_in, |s| s.min(derived.refresh_in)));

                    tracing::debug!(
                        position = index + 1,
                        total,
                        refresh_in = derived.refresh_in,
                        "Session token refreshed"
                    );

                    if step + 1 < total {
                        pool.advance();
                    }
                }
                Err(err) => {
                    tracing::error!(
                        position = index + 1,
                        total,
                        error = %err,
                        "Failed to get session token for credential"
                    );
                    if !pool.mark_unhealthy_at(index) {
                        break;
                    }
                }
            }
        }

        pool.rotate_to_next_healthy();

        soonest
            .map(Duration::from_secs)
            .unwrap_or(self.config.default_refresh_in)
    }

    async fn refresh_single(&self) -> Result<Duration, RefreshError> {
        let primary = self.facade.primary().ok_or(RefreshError::MissingPrimary)?;
        let derived = self.exchange.exchange(&primary).await?;

        if self.config.show_token {
            tracing::info!(token = %derived.token, "Session token");
        }
        tracing::debug!(refresh_in = derived.refresh_in, "Session token refreshed");

        let refresh_in = Duration::from_secs(derived.refresh_in);
        self.facade.set_derived(derived.token);
        Ok(refresh_in)
    }

    /// Refresh forever, sleeping until shortly before each refresh is due
    pub async fn run(&self, mut refresh_in: Duration) {
        loop {
            let delay = self.next_delay(refresh_in);
            tracing::debug!(delay_secs = delay.as_secs(), "Next session token refresh scheduled");
            tokio::time::sleep(delay).await;

            match self.refresh().await {
                Ok(next) => refresh_in = next,
                Err(err) => {
                    tracing::error!(error = %err, "Scheduled session token refresh failed");
                }
            }
        }
    }

    /// Start [`run`](Self::run) as a background task
    pub fn spawn(self: Arc<Self>, first_refresh_in: Duration) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(first_refresh_in).await })
    }
}
