// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease store abstraction
//!
//! A store keeps at most one record per [`LeaseKey`]. Every read path applies
//! the store's [`ExpiryPolicy`], so a stale record behaves exactly like a
//! missing one whether or not it has been purged yet.

mod memory;

pub use memory::MemoryLeaseStore;

use crate::lease::{Lease, LeaseKey, SessionToken};
use crate::policy::ExpiryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from lease store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt lease record at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("lease store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a conditional insert
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No active lease existed; the new lease is now stored
    Inserted(Lease),
    /// An active lease already exists for the key
    Conflict(Lease),
}

/// Durable keyed storage for lease records
#[async_trait]
pub trait LeaseStore: Clone + Send + Sync + 'static {
    /// The staleness rule applied on every read path
    fn policy(&self) -> ExpiryPolicy;

    /// Insert `lease` unless an active lease exists for its key.
    ///
    /// The check and the write are one atomic step. A stale record for the
    /// key is replaced.
    async fn try_insert(&self, lease: Lease, now: DateTime<Utc>)
        -> Result<InsertOutcome, StoreError>;

    /// Current active lease for `key`, if any
    async fn read(&self, key: &LeaseKey, now: DateTime<Utc>) -> Result<Option<Lease>, StoreError>;

    /// Bump `last_activity` iff an active lease held by `token` exists
    async fn touch(
        &self,
        key: &LeaseKey,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<Option<Lease>, StoreError>;

    /// Remove every record for `key`, active or not
    async fn delete_all(&self, key: &LeaseKey) -> Result<usize, StoreError>;

    /// Physically remove records idle beyond the purge grace
    async fn purge(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Every active lease
    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, StoreError>;
}
