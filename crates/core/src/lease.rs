// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease data model
//!
//! A lease is a time-bounded exclusive claim on the right to edit one
//! business record. Only the holder's session token proves ownership; every
//! view handed to other parties strips it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::clock::elapsed_between;

/// Longest accepted resource identifier, in bytes
pub const MAX_RESOURCE_ID_LEN: usize = 256;

/// Kind of record a lease protects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Project,
    Employee,
    Vehicle,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [
        ResourceType::Project,
        ResourceType::Employee,
        ResourceType::Vehicle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Project => "project",
            ResourceType::Employee => "employee",
            ResourceType::Vehicle => "vehicle",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown resource type: {0} (expected project, employee or vehicle)")]
pub struct ParseResourceTypeError(pub String);

impl FromStr for ResourceType {
    type Err = ParseResourceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseResourceTypeError(s.to_string()))
    }
}

/// Identifies the protected record: resource type plus opaque id
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseKey {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl LeaseKey {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    /// Check the resource id is usable as a key
    pub fn validate(&self) -> Result<(), String> {
        let id = &self.resource_id;
        if id.trim().is_empty() {
            return Err("resource id must not be empty".to_string());
        }
        if id.len() > MAX_RESOURCE_ID_LEN {
            return Err(format!(
                "resource id is {} bytes, limit is {}",
                id.len(),
                MAX_RESOURCE_ID_LEN
            ));
        }
        if id.chars().any(char::is_control) {
            return Err("resource id must not contain control characters".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.resource_id)
    }
}

/// Unique identifier for a lease holder (the user)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(pub String);

impl HolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque per-browser-session token proving lease ownership
///
/// Debug output is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Full identity of a lease owner, including the session credential
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holder {
    pub id: HolderId,
    pub name: String,
    pub role: String,
    pub token: SessionToken,
}

impl Holder {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        token: SessionToken,
    ) -> Self {
        Self {
            id: HolderId::new(id),
            name: name.into(),
            role: role.into(),
            token,
        }
    }

    /// Public view without the session token
    pub fn info(&self) -> HolderInfo {
        HolderInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }
}

/// Holder identity as disclosed to other parties
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderInfo {
    pub id: HolderId,
    pub name: String,
    pub role: String,
}

impl fmt::Display for HolderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() {
            &self.id.0
        } else {
            &self.name
        };
        if self.role.is_empty() {
            write!(f, "{}", name)
        } else {
            write!(f, "{} ({})", name, self.role)
        }
    }
}

/// Diagnostic metadata about the client that took the lease
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

/// A lease record as held by a store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub key: LeaseKey,
    pub holder: Holder,
    pub acquired_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub client: ClientContext,
}

impl Lease {
    pub fn new(key: LeaseKey, holder: Holder, client: ClientContext, now: DateTime<Utc>) -> Self {
        Self {
            key,
            holder,
            acquired_at: now,
            last_activity: now,
            client,
        }
    }

    /// Check if the lease belongs to the given session
    pub fn is_held_by(&self, token: &SessionToken) -> bool {
        &self.holder.token == token
    }

    /// Record a heartbeat; `last_activity` never moves backwards
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Time since the last heartbeat, zero if the clock reads earlier
    pub fn idle(&self, now: DateTime<Utc>) -> Duration {
        elapsed_between(self.last_activity, now)
    }

    /// Public view of this lease
    pub fn view(&self) -> LeaseView {
        LeaseView {
            resource_type: self.key.resource_type,
            resource_id: self.key.resource_id.clone(),
            holder: self.holder.info(),
            locked_at: self.acquired_at,
            last_activity: self.last_activity,
        }
    }
}

/// Lease as disclosed to other parties
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseView {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub holder: HolderInfo,
    pub locked_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
