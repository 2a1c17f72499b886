// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management: start, stop, status

use std::process::ExitCode;

use anyhow::Result;
use lease_daemon::Config;

use crate::client::{
    daemon_stop, find_leased_binary, read_daemon_pid, ClientError, DaemonClient,
};
use crate::output::{self, OutputFormat, StatusOutput};

#[derive(clap::Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(clap::Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon if it is not running
    Start {
        /// Run in the foreground instead of detaching
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
}

pub async fn daemon(args: DaemonArgs, config: &Config, format: OutputFormat) -> Result<ExitCode> {
    match args.command {
        DaemonCommand::Start { foreground: true } => {
            let status = std::process::Command::new(find_leased_binary())
                .env("LEASE_STATE_DIR", &config.state_dir)
                .env("LEASE_SOCKET_PATH", &config.socket_path)
                .status()?;
            Ok(match status.code() {
                Some(0) => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            })
        }
        DaemonCommand::Start { foreground: false } => {
            let client = DaemonClient::connect_or_start(config).await?;
            let version = client.hello().await?;
            println!(
                "Daemon running (version {}, socket {})",
                version,
                config.socket_path.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        DaemonCommand::Stop => {
            if daemon_stop(config).await? {
                println!("Daemon stopped");
            } else {
                println!("Daemon not running");
            }
            Ok(ExitCode::SUCCESS)
        }
        DaemonCommand::Status => {
            let client = match DaemonClient::connect(config) {
                Ok(client) => client,
                Err(ClientError::DaemonNotRunning) => {
                    println!("Daemon not running");
                    return Ok(ExitCode::SUCCESS);
                }
                Err(e) => return Err(e.into()),
            };

            let version = client.hello().await?;
            let (uptime_secs, leases, watchers) = client.status().await?;
            if format == OutputFormat::Text {
                println!("Daemon running");
                println!("Version:  {}", version);
                if let Some(pid) = read_daemon_pid(config) {
                    println!("PID:      {}", pid);
                }
                println!("Socket:   {}", config.socket_path.display());
            }
            output::print(
                &StatusOutput {
                    uptime_secs,
                    leases,
                    watchers,
                },
                format,
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
