// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease change events

use crate::lease::{HolderInfo, LeaseKey, ResourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const LEASE_ACQUIRED: &str = "lease_acquired";
pub const LEASE_RELEASED: &str = "lease_released";

/// Emitted after a lease operation changed who holds a resource
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LeaseEvent {
    #[serde(rename = "lease_acquired", rename_all = "camelCase")]
    Acquired {
        resource_type: ResourceType,
        resource_id: String,
        holder: HolderInfo,
        at: DateTime<Utc>,
    },
    #[serde(rename = "lease_released", rename_all = "camelCase")]
    Released {
        resource_type: ResourceType,
        resource_id: String,
        released_count: usize,
        at: DateTime<Utc>,
    },
}

impl LeaseEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            LeaseEvent::Acquired { .. } => LEASE_ACQUIRED,
            LeaseEvent::Released { .. } => LEASE_RELEASED,
        }
    }

    pub fn key(&self) -> LeaseKey {
        match self {
            LeaseEvent::Acquired {
                resource_type,
                resource_id,
                ..
            }
            | LeaseEvent::Released {
                resource_type,
                resource_id,
                ..
            } => LeaseKey::new(*resource_type, resource_id.clone()),
        }
    }

    /// Routing topic: `event:type:id`
    pub fn topic(&self) -> String {
        let key = self.key();
        format!("{}:{}:{}", self.name(), key.resource_type, key.resource_id)
    }
}
