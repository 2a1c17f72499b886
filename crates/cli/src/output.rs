// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use lease_core::{HolderInfo, LeaseEvent, LeaseKey, LeaseStats, LeaseStatus, LeaseView};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + fmt::Display>(items: &[T], empty: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text if items.is_empty() => println!("{}", empty),
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(items) {
                println!("{}", json);
            }
        }
    }
}

/// Print one streamed item; JSON output is one compact document per line
pub fn print_line<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string(value) {
                println!("{}", json);
            }
        }
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Outcome of `lease acquire`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireOutput {
    pub granted: bool,
    #[serde(skip)]
    pub key: LeaseKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<HolderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<LeaseView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_by: Option<HolderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
}

impl AcquireOutput {
    pub fn granted(lease: LeaseView, renewed: bool) -> Self {
        Self {
            granted: true,
            key: LeaseKey::new(lease.resource_type, lease.resource_id.clone()),
            renewed: Some(renewed),
            holder: Some(lease.holder.clone()),
            lease: Some(lease),
            denied_by: None,
            locked_at: None,
        }
    }

    pub fn denied(key: LeaseKey, denied_by: HolderInfo, locked_at: DateTime<Utc>) -> Self {
        Self {
            granted: false,
            key,
            renewed: None,
            holder: None,
            lease: None,
            denied_by: Some(denied_by),
            locked_at: Some(locked_at),
        }
    }
}

impl fmt::Display for AcquireOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.denied_by, &self.locked_at) {
            (Some(holder), Some(at)) => write!(
                f,
                "{} is locked by {} since {}",
                self.key,
                holder,
                timestamp(at)
            ),
            _ if self.renewed == Some(true) => write!(f, "Renewed lease on {}", self.key),
            _ => write!(f, "Acquired lease on {}", self.key),
        }
    }
}

/// Outcome of `lease renew`
#[derive(Debug, Serialize)]
pub struct RenewOutput {
    #[serde(skip)]
    pub key: LeaseKey,
    pub updated: bool,
}

impl fmt::Display for RenewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.updated {
            write!(f, "Renewed lease on {}", self.key)
        } else {
            write!(f, "No active lease held by this session on {}", self.key)
        }
    }
}

/// Outcome of `lease release`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOutput {
    #[serde(skip)]
    pub key: LeaseKey,
    pub released_count: usize,
}

impl fmt::Display for ReleaseOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.released_count == 0 {
            write!(f, "No lease on {}", self.key)
        } else {
            write!(f, "Released lease on {}", self.key)
        }
    }
}

/// Outcome of `lease inspect`
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct InspectOutput {
    #[serde(skip)]
    pub key: LeaseKey,
    pub status: LeaseStatus,
}

impl fmt::Display for InspectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = &self.status;
        let Some(holder) = status.holder.as_ref().filter(|_| status.active) else {
            return write!(f, "{} is not locked", self.key);
        };
        if status.is_own_lease {
            write!(f, "{} is locked by you ({})", self.key, holder)?;
        } else {
            write!(f, "{} is locked by {}", self.key, holder)?;
        }
        if let Some(at) = &status.locked_at {
            write!(f, " since {}", timestamp(at))?;
        }
        if let Some(at) = &status.last_activity {
            write!(f, "\n  last activity: {}", timestamp(at))?;
        }
        if let Some(at) = &status.expires_at {
            write!(f, "\n  expires:       {}", timestamp(at))?;
        }
        Ok(())
    }
}

/// One row of `lease list`
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct LeaseRow(pub LeaseView);

impl fmt::Display for LeaseRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lease = &self.0;
        write!(
            f,
            "{:<10} {:<20} {:<30} {}",
            lease.resource_type,
            lease.resource_id,
            lease.holder.to_string(),
            timestamp(&lease.last_activity)
        )
    }
}

/// One streamed event from `lease watch`
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct EventLine(pub LeaseEvent);

impl fmt::Display for EventLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            LeaseEvent::Acquired {
                resource_type,
                resource_id,
                holder,
                at,
            } => write!(
                f,
                "{} acquired {}/{} by {}",
                timestamp(at),
                resource_type,
                resource_id,
                holder
            ),
            LeaseEvent::Released {
                resource_type,
                resource_id,
                at,
                ..
            } => write!(f, "{} released {}/{}", timestamp(at), resource_type, resource_id),
        }
    }
}

/// Output of `lease status`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub uptime_secs: u64,
    pub leases: LeaseStats,
    pub watchers: usize,
}

impl fmt::Display for StatusOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Uptime:   {}s", self.uptime_secs)?;
        writeln!(f, "Leases:   {}", self.leases.active)?;
        for (resource_type, count) in &self.leases.by_type {
            writeln!(f, "  {:<10} {}", resource_type, count)?;
        }
        write!(f, "Watchers: {}", self.watchers)
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
