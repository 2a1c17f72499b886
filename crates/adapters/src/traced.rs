// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced wrappers for consistent observability

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lease_core::{
    ChangeNotifier, ExpiryPolicy, InsertOutcome, Lease, LeaseEvent, LeaseKey, LeaseStore,
    NotifyError, SessionToken, StoreError,
};
use tracing::Instrument;

/// Wrapper that adds tracing to any LeaseStore
#[derive(Clone)]
pub struct TracedLeaseStore<S> {
    inner: S,
}

impl<S> TracedLeaseStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: LeaseStore> LeaseStore for TracedLeaseStore<S> {
    fn policy(&self) -> ExpiryPolicy {
        self.inner.policy()
    }

    async fn try_insert(
        &self,
        lease: Lease,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        let span = tracing::info_span!("store.try_insert", resource = %lease.key, holder = %lease.holder.id);
        async move {
            let start = std::time::Instant::now();
            let result = self.inner.try_insert(lease, now).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(InsertOutcome::Inserted(_)) => tracing::info!(elapsed_ms, "lease inserted"),
                Ok(InsertOutcome::Conflict(existing)) => tracing::info!(
                    elapsed_ms,
                    current_holder = %existing.holder.id,
                    "lease conflict"
                ),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "insert failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn read(&self, key: &LeaseKey, now: DateTime<Utc>) -> Result<Option<Lease>, StoreError> {
        let result = self.inner.read(key, now).await;
        match &result {
            Ok(lease) => tracing::trace!(resource = %key, active = lease.is_some(), "read"),
            Err(e) => tracing::error!(resource = %key, error = %e, "read failed"),
        }
        result
    }

    async fn touch(
        &self,
        key: &LeaseKey,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<Option<Lease>, StoreError> {
        let span = tracing::info_span!("store.touch", resource = %key);
        async move {
            let result = self.inner.touch(key, token, now).await;
            match &result {
                Ok(Some(_)) => tracing::debug!("touched"),
                Ok(None) => tracing::debug!("no matching active lease"),
                Err(e) => tracing::error!(error = %e, "touch failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn delete_all(&self, key: &LeaseKey) -> Result<usize, StoreError> {
        let span = tracing::info_span!("store.delete_all", resource = %key);
        async move {
            let result = self.inner.delete_all(key).await;
            match &result {
                Ok(count) => tracing::info!(count, "deleted"),
                Err(e) => tracing::error!(error = %e, "delete failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let span = tracing::info_span!("store.purge");
        async move {
            let start = std::time::Instant::now();
            let result = self.inner.purge(now).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(count) => tracing::debug!(count, elapsed_ms, "purged"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "purge failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, StoreError> {
        let result = self.inner.list_active(now).await;
        tracing::trace!(count = result.as_ref().map(|v| v.len()).ok(), "listed leases");
        result
    }
}

/// Wrapper that adds tracing to any ChangeNotifier
#[derive(Clone)]
pub struct TracedNotifier<N> {
    inner: N,
}

impl<N> TracedNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<N: ChangeNotifier> ChangeNotifier for TracedNotifier<N> {
    async fn publish(&self, event: &LeaseEvent) -> Result<(), NotifyError> {
        let topic = event.topic();
        let result = self.inner.publish(event).await;
        match &result {
            Ok(()) => tracing::debug!(topic, "published"),
            // Delivery is best effort; callers carry on
            Err(e) => tracing::warn!(topic, error = %e, "publish failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
