// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use lease_adapters::TracedLeaseStore;
use lease_core::{
    LeaseSettings, LeaseStats, SettingsError, StoreError, SweepTask, SystemClock,
};
use lease_storage::FileLeaseStore;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::server::ServerContext;

/// Store as wired in the daemon (wrapped with tracing)
pub type DaemonStore = TracedLeaseStore<FileLeaseStore>;

/// Server context with concrete store and clock
pub type DaemonContext = ServerContext<DaemonStore, SystemClock>;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of all daemon state
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to lease settings (TOML)
    pub settings_path: PathBuf,
    /// Path to the lease store directory
    pub store_path: PathBuf,
}

impl Config {
    /// Resolve paths from the environment
    ///
    /// `LEASE_STATE_DIR` wins over `XDG_STATE_HOME`, which wins over
    /// `~/.local/state`. `LEASE_SOCKET_PATH` moves only the socket.
    pub fn from_env() -> Result<Self, LifecycleError> {
        let mut config = Self::for_state_dir(&state_dir()?);
        if let Ok(socket) = std::env::var("LEASE_SOCKET_PATH") {
            if !socket.is_empty() {
                config.socket_path = PathBuf::from(socket);
            }
        }
        Ok(config)
    }

    /// Layout under an explicit state directory
    pub fn for_state_dir(state_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            socket_path: state_dir.join("leased.sock"),
            lock_path: state_dir.join("leased.pid"),
            version_path: state_dir.join("leased.version"),
            log_path: state_dir.join("leased.log"),
            settings_path: state_dir.join("config.toml"),
            store_path: state_dir.join("store"),
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Shared state handed to each connection task
    pub context: DaemonContext,
    /// Periodic purge of long-stale records
    pub sweep: SweepTask<DaemonStore, SystemClock>,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        for (what, path) in [
            ("socket", &self.config.socket_path),
            ("PID", &self.config.lock_path),
            ("version", &self.config.version_path),
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {} file: {}", what, e);
                }
            }
        }

        // Lock is released when self.lock_file is dropped
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Another daemon owns these files
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races. Truncate only once held.
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    FileExt::try_lock_exclusive(&lock_file).map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Load settings BEFORE binding socket (fail fast on bad config)
    let settings = LeaseSettings::load(&config.settings_path)?;
    info!(
        lease_timeout = %humantime::format_duration(settings.lease_timeout),
        purge_grace = %humantime::format_duration(settings.purge_grace),
        sweep_interval = %humantime::format_duration(settings.sweep_interval),
        "Loaded settings"
    );

    // 4. Open the store and report what survived the last run
    let store = TracedLeaseStore::new(FileLeaseStore::open(
        &config.store_path,
        settings.expiry_policy(),
    )?);
    let stats = LeaseStats::collect(&store, &SystemClock).await?;
    info!(active = stats.active, "Opened lease store at {}", config.store_path.display());

    let sweep = SweepTask::new(store.clone(), SystemClock, settings.sweep_interval);
    if let Err(e) = sweep.tick().await {
        warn!("Initial sweep failed: {}", e);
    }

    // 5. Remove stale socket and bind (LAST - only after all validation passes)
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let context = ServerContext::new(store, SystemClock, settings);

    info!("Daemon started in {}", config.state_dir.display());

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        context,
        sweep,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [
        &config.socket_path,
        &config.version_path,
        &config.lock_path,
    ] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Get the state directory for lease
fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("LEASE_STATE_DIR") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("lease"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/lease"))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
