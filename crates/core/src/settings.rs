// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease service settings
//!
//! Loaded from a TOML file with human-readable durations:
//!
//! ```toml
//! lease_timeout = "15m"
//! purge_grace = "30m"
//! sweep_interval = "60s"
//! heartbeat_interval = "5m"
//! ```
//!
//! Every key is optional. Without `heartbeat_interval` clients are told to
//! beat three times per lease timeout.

use crate::policy::{ExpiryPolicy, DEFAULT_LEASE_TIMEOUT, DEFAULT_PURGE_GRACE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Heartbeats a client should send within one lease timeout by default
const HEARTBEATS_PER_TIMEOUT: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SettingsFile")]
pub struct LeaseSettings {
    /// How long a lease survives without a heartbeat
    #[serde(with = "humantime_serde")]
    pub lease_timeout: Duration,
    /// Idle time after which the sweep may delete a stale record
    #[serde(with = "humantime_serde")]
    pub purge_grace: Duration,
    /// How often the sweep runs
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Advisory heartbeat cadence for clients
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
}

impl Default for LeaseSettings {
    fn default() -> Self {
        SettingsFile::default().into()
    }
}

/// Settings as written on disk; absent keys take defaults
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default, with = "humantime_serde::option")]
    lease_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    purge_grace: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    sweep_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    heartbeat_interval: Option<Duration>,
}

impl From<SettingsFile> for LeaseSettings {
    fn from(file: SettingsFile) -> Self {
        let lease_timeout = file.lease_timeout.unwrap_or(DEFAULT_LEASE_TIMEOUT);
        Self {
            lease_timeout,
            purge_grace: file.purge_grace.unwrap_or(DEFAULT_PURGE_GRACE),
            sweep_interval: file.sweep_interval.unwrap_or(Duration::from_secs(60)),
            heartbeat_interval: file
                .heartbeat_interval
                .unwrap_or(lease_timeout / HEARTBEATS_PER_TIMEOUT),
        }
    }
}

impl LeaseSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: LeaseSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(SettingsError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.lease_timeout.is_zero() {
            return Err(SettingsError::Invalid(
                "lease_timeout must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(SettingsError::Invalid(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_interval >= self.lease_timeout {
            return Err(SettingsError::Invalid(format!(
                "heartbeat_interval ({}) must be shorter than lease_timeout ({}); set heartbeat_interval to a smaller value",
                humantime::format_duration(self.heartbeat_interval),
                humantime::format_duration(self.lease_timeout),
            )));
        }
        Ok(())
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(self.lease_timeout, self.purge_grace)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
