// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease manager: mutual exclusion on top of a [`LeaseStore`]
//!
//! The manager holds no lease state of its own. Every decision is made by
//! the store's atomic primitives, so any number of managers (threads or
//! processes) may share one store.

use crate::clock::Clock;
use crate::event::LeaseEvent;
use crate::lease::{
    ClientContext, Holder, HolderInfo, Lease, LeaseKey, LeaseView, ResourceType, SessionToken,
};
use crate::notify::ChangeNotifier;
use crate::policy::ExpiryPolicy;
use crate::store::{InsertOutcome, LeaseStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A request to take the lease on one record
#[derive(Clone, Debug)]
pub struct AcquireRequest {
    pub key: LeaseKey,
    pub holder: Holder,
    pub client: ClientContext,
}

impl AcquireRequest {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>, holder: Holder) -> Self {
        Self {
            key: LeaseKey::new(resource_type, resource_id),
            holder,
            client: ClientContext::default(),
        }
    }

    pub fn with_client(mut self, client: ClientContext) -> Self {
        self.client = client;
        self
    }
}

/// Result of an acquire call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller holds the lease. `renewed` is true when it already did.
    Granted { lease: Lease, renewed: bool },
    /// Another holder's lease is active
    Denied { current: LeaseView },
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted { .. })
    }
}

/// Answer to an inspect call, as seen by one viewer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseStatus {
    pub active: bool,
    pub is_own_lease: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<HolderInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl LeaseStatus {
    fn from_lease(lease: Option<&Lease>, viewer: Option<&SessionToken>, policy: &ExpiryPolicy) -> Self {
        match lease {
            None => LeaseStatus::default(),
            Some(lease) => LeaseStatus {
                active: true,
                is_own_lease: viewer.is_some_and(|token| lease.is_held_by(token)),
                holder: Some(lease.holder.info()),
                locked_at: Some(lease.acquired_at),
                last_activity: Some(lease.last_activity),
                expires_at: Some(policy.expires_at(lease)),
            },
        }
    }
}

/// Stateless lease operations over a shared store
#[derive(Clone)]
pub struct LeaseManager<S, N, C> {
    store: S,
    notifier: N,
    clock: C,
}

impl<S, N, C> LeaseManager<S, N, C>
where
    S: LeaseStore,
    N: ChangeNotifier,
    C: Clock,
{
    pub fn new(store: S, notifier: N, clock: C) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.store.policy()
    }

    /// Take the lease, or renew it if the caller's session already holds it.
    ///
    /// Never waits: a lease held by someone else yields `Denied` with that
    /// holder's public identity.
    pub async fn acquire(&self, request: AcquireRequest) -> Result<AcquireOutcome, LeaseError> {
        validate_key(&request.key)?;
        validate_token(&request.holder.token)?;

        let AcquireRequest {
            key,
            holder,
            client,
        } = request;
        let now = self.clock.now();

        if let Some(existing) = self.store.read(&key, now).await? {
            if !existing.is_held_by(&holder.token) {
                info!(resource = %key, holder = %existing.holder.id, requester = %holder.id, "lease denied");
                return Ok(AcquireOutcome::Denied {
                    current: existing.view(),
                });
            }
            if let Some(lease) = self.store.touch(&key, &holder.token, now).await? {
                debug!(resource = %key, holder = %holder.id, "lease re-acquired by holder");
                return Ok(AcquireOutcome::Granted {
                    lease,
                    renewed: true,
                });
            }
            // Released or expired between read and touch
        }

        let candidate = Lease::new(key.clone(), holder, client, now);
        let requester = candidate.holder.id.clone();
        let token = candidate.holder.token.clone();

        match self.store.try_insert(candidate, now).await? {
            InsertOutcome::Inserted(lease) => {
                info!(resource = %key, holder = %lease.holder.id, "lease acquired");
                self.notify(LeaseEvent::Acquired {
                    resource_type: key.resource_type,
                    resource_id: key.resource_id.clone(),
                    holder: lease.holder.info(),
                    at: now,
                })
                .await;
                Ok(AcquireOutcome::Granted {
                    lease,
                    renewed: false,
                })
            }
            InsertOutcome::Conflict(current) if current.is_held_by(&token) => {
                debug!(resource = %key, holder = %requester, "lease acquired by concurrent request of same session");
                Ok(AcquireOutcome::Granted {
                    lease: current,
                    renewed: true,
                })
            }
            InsertOutcome::Conflict(current) => {
                info!(resource = %key, holder = %current.holder.id, requester = %requester, "lease denied after race");
                Ok(AcquireOutcome::Denied {
                    current: current.view(),
                })
            }
        }
    }

    /// Heartbeat. Returns false when no active lease is held by `token`.
    pub async fn renew(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        token: &SessionToken,
    ) -> Result<bool, LeaseError> {
        let key = LeaseKey::new(resource_type, resource_id);
        validate_key(&key)?;
        validate_token(token)?;

        let now = self.clock.now();
        let renewed = self.store.touch(&key, token, now).await?.is_some();
        debug!(resource = %key, renewed, "lease heartbeat");
        Ok(renewed)
    }

    /// Remove the lease regardless of who holds it.
    ///
    /// Any caller may release any lease; pages rely on this to recover
    /// records left locked by abandoned sessions.
    pub async fn release(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<usize, LeaseError> {
        let key = LeaseKey::new(resource_type, resource_id);
        validate_key(&key)?;

        let released = self.store.delete_all(&key).await?;
        if released > 0 {
            info!(resource = %key, released, "lease released");
            self.notify(LeaseEvent::Released {
                resource_type,
                resource_id: key.resource_id.clone(),
                released_count: released,
                at: self.clock.now(),
            })
            .await;
        } else {
            debug!(resource = %key, "release found no lease");
        }
        Ok(released)
    }

    /// Read-only view of the lease for `viewer`
    pub async fn inspect(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        viewer: Option<&SessionToken>,
    ) -> Result<LeaseStatus, LeaseError> {
        let key = LeaseKey::new(resource_type, resource_id);
        validate_key(&key)?;

        let lease = self.store.read(&key, self.clock.now()).await?;
        Ok(LeaseStatus::from_lease(
            lease.as_ref(),
            viewer,
            &self.store.policy(),
        ))
    }

    /// Every active lease, without credentials
    pub async fn list_active(&self) -> Result<Vec<LeaseView>, LeaseError> {
        let leases = self.store.list_active(self.clock.now()).await?;
        Ok(leases.iter().map(Lease::view).collect())
    }

    /// Physically remove long-stale records
    pub async fn purge_stale(&self) -> Result<usize, LeaseError> {
        Ok(self.store.purge(self.clock.now()).await?)
    }

    async fn notify(&self, event: LeaseEvent) {
        if let Err(e) = self.notifier.publish(&event).await {
            warn!(topic = %event.topic(), error = %e, "failed to publish lease event");
        }
    }
}

fn validate_key(key: &LeaseKey) -> Result<(), LeaseError> {
    key.validate().map_err(LeaseError::InvalidRequest)
}

fn validate_token(token: &SessionToken) -> Result<(), LeaseError> {
    if token.is_empty() {
        return Err(LeaseError::InvalidRequest(
            "session token must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
