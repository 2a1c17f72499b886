// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lease_core::{
    ClientContext, Holder, HolderInfo, LeaseEvent, LeaseStats, LeaseStatus, LeaseView, ResourceType,
    SessionToken,
};
use lease_daemon::protocol::{self, ProtocolError};
use lease_daemon::{Config, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("LEASE_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("LEASE_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("LEASE_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("LEASE_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,
}

/// Result of an acquire call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireReply {
    Granted {
        lease: LeaseView,
        renewed: bool,
    },
    Denied {
        denied_by: HolderInfo,
        locked_at: DateTime<Utc>,
        last_activity: DateTime<Utc>,
    },
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to daemon, auto-starting if not running
    pub async fn connect_or_start(config: &Config) -> Result<Self, ClientError> {
        // Restart a daemon left over from another version
        if let Ok(daemon_version) = std::fs::read_to_string(&config.version_path) {
            if daemon_version.trim() != env!("CARGO_PKG_VERSION") {
                tracing::debug!(
                    running = daemon_version.trim(),
                    expected = env!("CARGO_PKG_VERSION"),
                    "restarting daemon from another version"
                );
                let _ = daemon_stop(config).await;
            }
        }

        match Self::connect(config) {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning) => {
                let child = start_daemon_background(config)?;
                Self::connect_with_retry(config, timeout_connect(), child).await
            }
            Err(e) => Err(wrap_with_startup_error(e, config)),
        }
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect(config: &Config) -> Result<Self, ClientError> {
        if !config.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }

        Ok(Self::at(config.socket_path.clone()))
    }

    /// Client for an explicit socket path
    pub fn at(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    async fn connect_with_retry(
        config: &Config,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Daemon exited early: startup failed
            if let Ok(Some(status)) = child.try_wait() {
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error(config) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect(config) {
                Ok(client) if client.ping().await.is_ok() => return Ok(client),
                Ok(_) | Err(ClientError::DaemonNotRunning) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(wrap_with_startup_error(e, config)),
            }
        }

        Err(wrap_with_startup_error(
            ClientError::DaemonStartTimeout,
            config,
        ))
    }

    /// Send a request and receive a response with a specific timeout
    async fn send_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        Ok(protocol::round_trip(&mut stream, &request, timeout).await?)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc()).await
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version, .. } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    pub async fn acquire(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        holder: Holder,
        client: ClientContext,
    ) -> Result<AcquireReply, ClientError> {
        let request = Request::Acquire {
            resource_type,
            resource_id: resource_id.to_string(),
            holder,
            client,
        };
        match self.send(request).await? {
            Response::Acquired { lease, renewed } => Ok(AcquireReply::Granted { lease, renewed }),
            Response::Denied {
                denied_by,
                locked_at,
                last_activity,
            } => Ok(AcquireReply::Denied {
                denied_by,
                locked_at,
                last_activity,
            }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn renew(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        token: SessionToken,
    ) -> Result<bool, ClientError> {
        let request = Request::Renew {
            resource_type,
            resource_id: resource_id.to_string(),
            token,
        };
        match self.send(request).await? {
            Response::Renewed { updated } => Ok(updated),
            other => Err(unexpected(other)),
        }
    }

    pub async fn release(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<usize, ClientError> {
        let request = Request::Release {
            resource_type,
            resource_id: resource_id.to_string(),
        };
        match self.send(request).await? {
            Response::Released { released_count } => Ok(released_count),
            other => Err(unexpected(other)),
        }
    }

    pub async fn inspect(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        token: Option<SessionToken>,
    ) -> Result<LeaseStatus, ClientError> {
        let request = Request::Inspect {
            resource_type,
            resource_id: resource_id.to_string(),
            token,
        };
        match self.send(request).await? {
            Response::Lease { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list(&self) -> Result<Vec<LeaseView>, ClientError> {
        match self.send(Request::List).await? {
            Response::Leases { leases } => Ok(leases),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon status: uptime, lease counts, watcher count
    pub async fn status(&self) -> Result<(u64, LeaseStats, usize), ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                leases,
                watchers,
                ..
            } => Ok((uptime_secs, leases, watchers)),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Open an event stream; the daemon acknowledges before streaming
    pub async fn watch(&self, pattern: &str) -> Result<EventStream, ClientError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        let request = Request::Watch {
            pattern: pattern.to_string(),
        };
        match protocol::round_trip(&mut stream, &request, timeout_ipc()).await? {
            Response::Ok => Ok(EventStream { stream }),
            other => Err(unexpected(other)),
        }
    }
}

/// Live event stream from the daemon
pub struct EventStream {
    stream: UnixStream,
}

impl EventStream {
    /// Next event; `None` once the daemon closes the stream
    pub async fn next(&mut self) -> Result<Option<LeaseEvent>, ClientError> {
        let bytes = match protocol::read_message(&mut self.stream).await {
            Ok(bytes) => bytes,
            Err(ProtocolError::ConnectionClosed) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match protocol::decode::<Response>(&bytes)? {
            Response::Event { event } => Ok(Some(event)),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

/// Resolve daemon paths from the environment
pub fn daemon_config() -> Result<Config, ClientError> {
    Config::from_env().map_err(|_| ClientError::NoStateDir)
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background(config: &Config) -> Result<std::process::Child, ClientError> {
    let leased_path = find_leased_binary();
    tracing::debug!(binary = %leased_path.display(), "starting daemon");

    Command::new(&leased_path)
        .env("LEASE_STATE_DIR", &config.state_dir)
        .env("LEASE_SOCKET_PATH", &config.socket_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            ClientError::DaemonStartFailed(format!("{}: {}", leased_path.display(), e))
        })
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop(config: &Config) -> Result<bool, ClientError> {
    let client = match DaemonClient::connect(config) {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            cleanup_stale_pid(config);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid(config) {
        if shutdown_result.is_ok() {
            wait_for_exit(pid, timeout_exit()).await;
        }

        // Force kill if still running
        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_pid(config);

    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the leased binary
pub fn find_leased_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("LEASE_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Sibling of the current executable
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("leased");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    // Fall back to PATH lookup
    PathBuf::from("leased")
}

/// Remove the socket and PID file left by a daemon that is gone
fn cleanup_stale_pid(config: &Config) {
    for path in [&config.lock_path, &config.socket_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid(config: &Config) -> Option<u32> {
    std::fs::read_to_string(&config.lock_path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
}

/// Whether a process with this pid is alive (`kill -0`)
pub fn process_exists(pid: u32) -> bool {
    send_signal(pid, "-0")
}

/// SIGKILL a daemon that ignored the shutdown request
pub fn force_kill_daemon(pid: u32) -> bool {
    send_signal(pid, "-9")
}

fn send_signal(pid: u32, signal: &str) -> bool {
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// First line the daemon logs for each startup attempt
const STARTUP_MARKER_PREFIX: &str = "--- leased: starting (pid: ";

/// Line the daemon writes synchronously when startup fails
const STARTUP_ERROR_PREFIX: &str = "ERROR Failed to start daemon: ";

/// Why the most recent daemon start failed, according to its log
pub fn read_startup_error(config: &Config) -> Option<String> {
    let content = std::fs::read_to_string(&config.log_path).ok()?;
    startup_error_from_log(&content)
}

fn startup_error_from_log(content: &str) -> Option<String> {
    let attempt = &content[content.rfind(STARTUP_MARKER_PREFIX)?..];

    if let Some(message) = attempt
        .lines()
        .find_map(|line| line.strip_prefix(STARTUP_ERROR_PREFIX))
    {
        return Some(message.to_string());
    }

    // Fall back to tracing output: "timestamp ERROR target: message"
    let errors: Vec<&str> = attempt
        .lines()
        .filter(|line| line.contains(" ERROR "))
        .map(|line| line.split_once(": ").map_or(line, |(_, message)| message))
        .collect();

    (!errors.is_empty()).then(|| errors.join("\n"))
}

/// Wrap an error with startup log info if available.
fn wrap_with_startup_error(err: ClientError, config: &Config) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    match read_startup_error(config) {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
