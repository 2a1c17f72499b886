// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease Daemon (leased)
//!
//! Background process that owns the lease store and serves lease requests
//! over a Unix socket.

use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info};

use lease_daemon::lifecycle::{self, Config, DaemonState, LifecycleError};
use lease_daemon::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    // Marker goes in before tracing so the CLI can find this attempt's lines
    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;
    info!(state_dir = %config.state_dir.display(), version = env!("CARGO_PKG_VERSION"), "starting leased");

    let mut daemon = match lifecycle::startup(&config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            // Non-blocking writer may not flush before exit
            write_startup_error(&config, &e);
            error!(error = %e, "startup failed");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let reason = serve(&daemon).await?;
    info!(reason, "shutting down");

    daemon.shutdown().await?;
    info!("leased stopped");
    Ok(())
}

/// Accept connections until asked to stop; returns what stopped us
async fn serve(daemon: &DaemonState) -> std::io::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = daemon.context.shutdown_signal();

    // Purging runs beside the accept loop so a slow sweep never delays clients
    let sweeper = daemon.sweep.clone().spawn();

    info!(socket = %daemon.config.socket_path.display(), "leased ready");

    let reason = loop {
        tokio::select! {
            accepted = daemon.listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let ctx = daemon.context.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server::handle_connection(ctx, stream).await {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            },
            _ = shutdown.notified() => break "shutdown requested",
            _ = sigterm.recv() => break "SIGTERM",
            _ = sigint.recv() => break "SIGINT",
        }
    };

    sweeper.abort();
    Ok(reason)
}

/// First line of every startup attempt in the log: `--- leased: starting (pid: N)`
const STARTUP_MARKER_PREFIX: &str = "--- leased: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{})", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // LEASE_LOG takes precedence over RUST_LOG
    let filter = EnvFilter::try_from_env("LEASE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}
