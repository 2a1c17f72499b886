// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process lease store
//!
//! Each operation runs inside a single mutex critical section, which is what
//! makes `try_insert` a compare-and-swap rather than a read-then-write.

use super::{InsertOutcome, LeaseStore, StoreError};
use crate::lease::{Lease, LeaseKey, SessionToken};
use crate::policy::ExpiryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
pub struct MemoryLeaseStore {
    policy: ExpiryPolicy,
    leases: Arc<Mutex<HashMap<LeaseKey, Lease>>>,
}

impl MemoryLeaseStore {
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            policy,
            leases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of physically stored records, stale ones included
    pub fn record_count(&self) -> usize {
        self.records().len()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<LeaseKey, Lease>> {
        self.leases.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    async fn try_insert(
        &self,
        lease: Lease,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        let mut leases = self.records();
        if let Some(existing) = leases.get(&lease.key) {
            if self.policy.is_active(existing, now) {
                return Ok(InsertOutcome::Conflict(existing.clone()));
            }
        }
        leases.insert(lease.key.clone(), lease.clone());
        Ok(InsertOutcome::Inserted(lease))
    }

    async fn read(&self, key: &LeaseKey, now: DateTime<Utc>) -> Result<Option<Lease>, StoreError> {
        let leases = self.records();
        Ok(leases
            .get(key)
            .filter(|lease| self.policy.is_active(lease, now))
            .cloned())
    }

    async fn touch(
        &self,
        key: &LeaseKey,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<Option<Lease>, StoreError> {
        let mut leases = self.records();
        match leases.get_mut(key) {
            Some(lease) if lease.is_held_by(token) && self.policy.is_active(lease, now) => {
                lease.touch(now);
                Ok(Some(lease.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_all(&self, key: &LeaseKey) -> Result<usize, StoreError> {
        Ok(usize::from(self.records().remove(key).is_some()))
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut leases = self.records();
        let before = leases.len();
        leases.retain(|_, lease| !self.policy.is_purgeable(lease, now));
        Ok(before - leases.len())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, StoreError> {
        let leases = self.records();
        let mut active: Vec<Lease> = leases
            .values()
            .filter(|lease| self.policy.is_active(lease, now))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(active)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
