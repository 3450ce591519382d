//! Credential Pool Implementation
//!
//! This module provides the `CredentialPool` that owns the ordered set of
//! primary credentials, the current-entry pointer and per-entry health.

use super::entry::{CredentialEntry, EntryStatus, PoolStats};
use crate::error::PoolError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Callback fired with the new primary credential and its 0-based index
/// whenever the current entry actually changes
pub type ChangeListener = Box<dyn Fn(&str, usize) + Send + Sync>;

// ============================================================================
// Pool State
// ============================================================================

/// Entries plus the current index, always mutated together under one lock
#[derive(Debug)]
struct PoolState {
    entries: Vec<CredentialEntry>,
    current: usize,
}

/// A change of the current entry, reported once the lock is released
struct Change {
    primary: String,
    index: usize,
}

impl PoolState {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn change(&self) -> Change {
        Change {
            primary: self.entries[self.current].primary().to_string(),
            index: self.current,
        }
    }

    fn advance(&mut self, now: DateTime<Utc>) -> Option<Change> {
        let previous = self.current;
        self.current = (self.current + 1) % self.len();
        self.entries[self.current].touch(now);

        (previous != self.current).then(|| self.change())
    }

    /// Strictly circular scan starting just after the current index.
    /// The index only moves when a healthy entry is found.
    fn rotate_to_next_healthy(&mut self, now: DateTime<Utc>) -> (bool, Option<Change>) {
        let start = self.current;
        let len = self.len();

        for step in 1..=len {
            let candidate = (start + step) % len;
            if self.entries[candidate].is_healthy() {
                self.current = candidate;
                self.entries[candidate].touch(now);
                let change = (candidate != start).then(|| self.change());
                return (true, change);
            }
        }

        (false, None)
    }

    fn available(&self) -> usize {
        self.entries.iter().filter(|e| e.is_healthy()).count()
    }
}

// ============================================================================
// Credential Pool
// ============================================================================

/// Ordered pool of primary credentials with rotation and health tracking
///
/// Created once at startup and shared by reference (`Arc`) with the
/// executor, the refresh scheduler and the credential facade. The pool is
/// never resized; unhealthy entries stay in place until `reset_all`.
pub struct CredentialPool {
    state: Mutex<PoolState>,
    listener: Option<ChangeListener>,
}

impl CredentialPool {
    /// Create a pool from primary credentials in input order
    ///
    /// The first credential is current and every entry starts healthy.
    pub fn new<I, S>(credentials: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<CredentialEntry> = credentials
            .into_iter()
            .map(|c| CredentialEntry::new(Into::<String>::into(c).trim()))
            .collect();

        if entries.is_empty() {
            return Err(PoolError::EmptyCredentialList);
        }

        tracing::info!(
            credential_count = entries.len(),
            "Credential pool initialized"
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                entries,
                current: 0,
            }),
            listener: None,
        })
    }

    /// Register a listener for changes of the current entry
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, usize) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Every mutation leaves the state consistent, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, change: Option<Change>) {
        if let (Some(listener), Some(change)) = (&self.listener, change) {
            listener(&change.primary, change.index);
        }
    }

    /// Snapshot of the current entry
    pub fn current(&self) -> CredentialEntry {
        let state = self.lock();
        state.entries[state.current].clone()
    }

    /// Index and snapshot of the current entry, read under one lock
    pub fn current_with_index(&self) -> (usize, CredentialEntry) {
        let state = self.lock();
        (state.current, state.entries[state.current].clone())
    }

    /// 0-based index of the current entry
    pub fn current_index(&self) -> usize {
        self.lock().current
    }

    pub fn total_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of healthy entries
    pub fn available_count(&self) -> usize {
        self.lock().available()
    }

    pub fn any_healthy(&self) -> bool {
        self.lock().entries.iter().any(|e| e.is_healthy())
    }

    /// Store a derived credential on the current entry, replacing any previous one
    pub fn set_derived(&self, value: impl Into<String>, expires_at: DateTime<Utc>) {
        let mut state = self.lock();
        let current = state.current;
        state.entries[current].set_derived(value.into(), expires_at);
    }

    /// Store a derived credential on the entry at `index`
    ///
    /// Used when the current entry may have moved while the value was being
    /// fetched. Out-of-range indices are ignored.
    pub fn set_derived_at(&self, index: usize, value: impl Into<String>, expires_at: DateTime<Utc>) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(index) {
            entry.set_derived(value.into(), expires_at);
        }
    }

    /// Unconditional round-robin step, ignoring health
    pub fn advance(&self) {
        let (change, position, total) = {
            let mut state = self.lock();
            let change = state.advance(Utc::now());
            (change, state.current + 1, state.len())
        };

        if change.is_some() {
            tracing::debug!(position, total, "Advanced to next credential");
        }
        self.notify(change);
    }

    /// Flag the current entry as unhealthy and move to the next healthy one
    ///
    /// Returns `false` when no healthy entry is left.
    pub fn mark_current_unhealthy(&self) -> bool {
        let (found, change, position, total) = {
            let mut state = self.lock();
            let current = state.current;
            state.entries[current].set_healthy(false);
            let (found, change) = state.rotate_to_next_healthy(Utc::now());
            (found, change, current + 1, state.len())
        };

        tracing::warn!(position, total, "Credential marked as unhealthy");
        self.report_rotation(found, change, total);
        found
    }

    /// Flag the entry at `index` as unhealthy
    ///
    /// Behaves like `mark_current_unhealthy` when `index` is still current;
    /// otherwise the current entry stays put and the result tells whether any
    /// healthy entry remains.
    pub fn mark_unhealthy_at(&self, index: usize) -> bool {
        let (found, change, total, was_current) = {
            let mut state = self.lock();
            let total = state.len();
            if index >= total {
                return state.available() > 0;
            }
            state.entries[index].set_healthy(false);
            if index == state.current {
                let (found, change) = state.rotate_to_next_healthy(Utc::now());
                (found, change, total, true)
            } else {
                (state.available() > 0, None, total, false)
            }
        };

        tracing::warn!(position = index + 1, total, "Credential marked as unhealthy");
        if was_current {
            self.report_rotation(found, change, total);
        } else if !found {
            tracing::error!(total, "All credentials are unhealthy");
        }
        found
    }

    /// Move to the first healthy entry after the current one, wrapping once
    ///
    /// Returns `false` and leaves the index untouched when every entry is
    /// unhealthy. With a single entry this reports that entry's health.
    pub fn rotate_to_next_healthy(&self) -> bool {
        let (found, change, total) = {
            let mut state = self.lock();
            let (found, change) = state.rotate_to_next_healthy(Utc::now());
            (found, change, state.len())
        };

        self.report_rotation(found, change, total);
        found
    }

    fn report_rotation(&self, found: bool, change: Option<Change>, total: usize) {
        if !found {
            tracing::error!(total, "All credentials are unhealthy");
            return;
        }
        if let Some(change) = &change {
            tracing::info!(
                position = change.index + 1,
                total,
                "Rotated to next healthy credential"
            );
        }
        self.notify(change);
    }

    /// Mark every entry healthy again without moving the current index
    pub fn reset_all(&self) {
        let total = {
            let mut state = self.lock();
            for entry in state.entries.iter_mut() {
                entry.set_healthy(true);
            }
            state.len()
        };

        tracing::info!(total, "All credentials reset to healthy");
    }

    /// Status of every entry, in pool order
    pub fn status(&self) -> Vec<EntryStatus> {
        let state = self.lock();
        state
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| EntryStatus::from_entry(index, entry, state.current))
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            total: state.len(),
            available: state.available(),
            current_position: state.current + 1,
        }
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("state", &*self.lock())
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
