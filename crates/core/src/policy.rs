// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expiry policy: the staleness predicate applied on every read path
//!
//! A lease is active while `now - last_activity < lease_timeout`. Physical
//! removal after `purge_grace` is hygiene only and never decides activity.

use crate::lease::Lease;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default time without a heartbeat before a lease goes stale
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Default idle time before a stale record may be physically removed
pub const DEFAULT_PURGE_GRACE: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryPolicy {
    lease_timeout: Duration,
    purge_grace: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
            purge_grace: DEFAULT_PURGE_GRACE,
        }
    }
}

impl ExpiryPolicy {
    /// Purge grace is raised to the lease timeout if configured shorter
    pub fn new(lease_timeout: Duration, purge_grace: Duration) -> Self {
        Self {
            lease_timeout,
            purge_grace: purge_grace.max(lease_timeout),
        }
    }

    pub fn with_lease_timeout(self, timeout: Duration) -> Self {
        Self::new(timeout, self.purge_grace)
    }

    pub fn with_purge_grace(self, grace: Duration) -> Self {
        Self::new(self.lease_timeout, grace)
    }

    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }

    pub fn purge_grace(&self) -> Duration {
        self.purge_grace
    }

    /// Check if the lease still counts as held
    pub fn is_active(&self, lease: &Lease, now: DateTime<Utc>) -> bool {
        lease.idle(now) < self.lease_timeout
    }

    pub fn is_stale(&self, lease: &Lease, now: DateTime<Utc>) -> bool {
        !self.is_active(lease, now)
    }

    /// Check if a sweep may physically delete the record
    pub fn is_purgeable(&self, lease: &Lease, now: DateTime<Utc>) -> bool {
        lease.idle(now) >= self.purge_grace
    }

    /// When the lease goes stale unless renewed
    pub fn expires_at(&self, lease: &Lease) -> DateTime<Utc> {
        chrono::Duration::from_std(self.lease_timeout)
            .ok()
            .and_then(|timeout| lease.last_activity.checked_add_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
