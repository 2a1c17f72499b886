// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic storage hygiene for lease stores
//!
//! The sweep only deletes records that every read path already treats as
//! absent. Lease correctness never depends on it running.

use crate::clock::Clock;
use crate::lease::ResourceType;
use crate::store::{LeaseStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Background sweep removing long-stale lease records
#[derive(Clone)]
pub struct SweepTask<S: LeaseStore, C: Clock> {
    store: S,
    clock: C,
    interval: Duration,
}

impl<S: LeaseStore, C: Clock> SweepTask<S, C> {
    pub fn new(store: S, clock: C, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    /// Run a single sweep, returning the number of records purged
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let purged = self.store.purge(self.clock.now()).await?;
        if purged > 0 {
            tracing::info!(purged, "purged stale lease records");
        } else {
            tracing::trace!("sweep found nothing to purge");
        }
        Ok(purged)
    }

    /// Get the sweep interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep once per interval on its own task, first run one interval from now.
    ///
    /// Runs until the handle is aborted. Failures are logged and retried on
    /// the next tick.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.tick().await {
                    tracing::warn!(error = %e, "sweep failed");
                }
            }
        })
    }
}

/// Statistics about active leases
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseStats {
    pub active: usize,
    pub by_type: BTreeMap<ResourceType, usize>,
}

impl LeaseStats {
    /// Collect statistics from a store
    pub async fn collect<S: LeaseStore>(store: &S, clock: &impl Clock) -> Result<Self, StoreError> {
        let mut stats = LeaseStats::default();
        for lease in store.list_active(clock.now()).await? {
            stats.active += 1;
            *stats.by_type.entry(lease.key.resource_type).or_default() += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
