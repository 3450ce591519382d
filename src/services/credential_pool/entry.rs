//! Credential entry and status types
//!
//! A `CredentialEntry` is one primary credential together with its health
//! flag and the derived session credential exchanged for it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::utils::mask_secret;

// ============================================================================
// Credential Entry
// ============================================================================

/// One primary credential and everything the pool tracks about it
///
/// Entries are mutated in place by the owning pool and handed out as
/// snapshots, so a caller never observes a half-applied update.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    primary: String,
    healthy: bool,
    last_used_at: Option<DateTime<Utc>>,
    derived: Option<String>,
    derived_expires_at: Option<DateTime<Utc>>,
}

impl CredentialEntry {
    pub(crate) fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            healthy: true,
            last_used_at: None,
            derived: None,
            derived_expires_at: None,
        }
    }

    /// The long-lived credential
    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// When this entry last became current
    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    /// The session credential, regardless of expiry
    pub fn derived(&self) -> Option<&str> {
        self.derived.as_deref()
    }

    pub fn derived_expires_at(&self) -> Option<DateTime<Utc>> {
        self.derived_expires_at
    }

    pub(crate) fn set_healthy(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_used_at = Some(now);
    }

    pub(crate) fn set_derived(&mut self, value: String, expires_at: DateTime<Utc>) {
        self.derived = Some(value);
        self.derived_expires_at = Some(expires_at);
    }
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("primary", &mask_secret(&self.primary))
            .field("healthy", &self.healthy)
            .field("last_used_at", &self.last_used_at)
            .field("derived", &self.derived.as_deref().map(mask_secret))
            .field("derived_expires_at", &self.derived_expires_at)
            .finish()
    }
}

// ============================================================================
// Introspection
// ============================================================================

/// Per-entry status for display, without any secret material
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStatus {
    /// 1-based position in the pool
    pub position: usize,
    pub healthy: bool,
    pub is_current: bool,
    pub has_derived: bool,
    pub derived_expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl EntryStatus {
    pub(crate) fn from_entry(index: usize, entry: &CredentialEntry, current: usize) -> Self {
        Self {
            position: index + 1,
            healthy: entry.healthy,
            is_current: index == current,
            has_derived: entry.derived.is_some(),
            derived_expires_at: entry.derived_expires_at,
            last_used_at: entry.last_used_at,
        }
    }
}

/// Pool-wide counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    /// 1-based position of the current entry
    pub current_position: usize,
}

impl PoolStats {
    /// At least one entry can still be rotated to
    pub fn is_healthy(&self) -> bool {
        self.available > 0
    }
}
