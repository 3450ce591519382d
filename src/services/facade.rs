//! Credential facade
//!
//! Callers read and write "the current credential" through
//! [`CredentialFacade`] without knowing whether one credential or a rotating
//! pool is configured. The variant is chosen once at startup by
//! [`build_facade`].

use chrono::{Duration, Utc};
use std::sync::{Arc, PoisonError, RwLock};

use super::credential_pool::{CredentialPool, PoolStats};
use crate::error::PoolError;
use crate::utils::mask_secret;

/// Read/write surface over the current primary and derived credentials
pub trait CredentialFacade: Send + Sync {
    /// Current primary credential
    fn primary(&self) -> Option<String>;

    /// Current derived session credential
    fn derived(&self) -> Option<String>;

    /// Replace the primary credential (ignored when pooled)
    fn set_primary(&self, value: String);

    /// Replace the derived credential of the current primary
    fn set_derived(&self, value: String);

    /// The backing pool, when rotation is active
    fn pool(&self) -> Option<&Arc<CredentialPool>> {
        None
    }

    fn is_pooled(&self) -> bool {
        self.pool().is_some()
    }
}

// ============================================================================
// Single Primary
// ============================================================================

/// One primary credential stored directly, no rotation
#[derive(Debug, Default)]
pub struct SinglePrimary {
    primary: RwLock<Option<String>>,
    derived: RwLock<Option<String>>,
}

impl SinglePrimary {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: RwLock::new(Some(primary.into())),
            derived: RwLock::new(None),
        }
    }
}

impl CredentialFacade for SinglePrimary {
    fn primary(&self) -> Option<String> {
        self.primary
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn derived(&self) -> Option<String> {
        self.derived
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_primary(&self, value: String) {
        *self.primary.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    fn set_derived(&self, value: String) {
        *self.derived.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }
}

// ============================================================================
// Pooled Primary
// ============================================================================

/// Pool-backed credentials; reads follow the pool's current entry
#[derive(Debug)]
pub struct PooledPrimary {
    pool: Arc<CredentialPool>,
    /// Expiry stamped on derived credentials written through the facade
    derived_ttl: Duration,
}

impl PooledPrimary {
    pub fn new(pool: Arc<CredentialPool>, derived_ttl: Duration) -> Self {
        Self { pool, derived_ttl }
    }
}

impl CredentialFacade for PooledPrimary {
    fn primary(&self) -> Option<String> {
        Some(self.pool.current().primary().to_string())
    }

    fn derived(&self) -> Option<String> {
        self.pool.current().derived().map(str::to_string)
    }

    fn set_primary(&self, _value: String) {
        // Pool primaries are fixed at construction
        tracing::debug!("Ignoring primary credential write in pool mode");
    }

    fn set_derived(&self, value: String) {
        if value.is_empty() {
            return;
        }
        self.pool.set_derived(value, Utc::now() + self.derived_ttl);
    }

    fn pool(&self) -> Option<&Arc<CredentialPool>> {
        Some(&self.pool)
    }
}

// ============================================================================
// Construction and pool helpers
// ============================================================================

/// Pick the facade variant for a parsed credential list
///
/// More than one credential enables the pool; exactly one keeps the plain
/// single-credential mode; none is a configuration error.
pub fn build_facade(
    credentials: Vec<String>,
    derived_ttl: Duration,
) -> Result<Arc<dyn CredentialFacade>, PoolError> {
    match credentials.len() {
        0 => Err(PoolError::EmptyCredentialList),
        1 => {
            tracing::info!("Using a single primary credential");
            let primary = credentials.into_iter().next().unwrap_or_default();
            Ok(Arc::new(SinglePrimary::new(primary)))
        }
        count => {
            let pool = CredentialPool::new(credentials)?.with_listener(|primary, index| {
                tracing::debug!(
                    credential = %mask_secret(primary),
                    position = index + 1,
                    "Active credential changed"
                );
            });
            tracing::info!(credential_count = count, "Using credential rotation");
            Ok(Arc::new(PooledPrimary::new(Arc::new(pool), derived_ttl)))
        }
    }
}

/// Manual round-robin step; `false` when rotation is not active
pub fn rotate_token(facade: &dyn CredentialFacade) -> bool {
    match facade.pool() {
        Some(pool) => {
            pool.advance();
            true
        }
        None => false,
    }
}

/// Pool counters for logging and display; `None` in single mode
pub fn token_status(facade: &dyn CredentialFacade) -> Option<PoolStats> {
    facade.pool().map(|pool| pool.stats())
}
