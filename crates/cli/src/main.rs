// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! lease - edit leases for business records

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod completions;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, lease};
use tracing_subscriber::EnvFilter;

use crate::client::{daemon_config, DaemonClient};
use crate::completions::CompletionsArgs;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "lease",
    version,
    about = "Exclusive edit leases for projects, employees and vehicles"
)]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Shorthand for `--output json`
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    identity: lease::Identity,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take the lease on a record, or renew the one you hold
    Acquire(lease::ResourceArgs),
    /// Heartbeat a lease you hold
    Renew(lease::ResourceArgs),
    /// Remove the lease on a record, whoever holds it
    Release(lease::ResourceArgs),
    /// Show who is editing a record
    Inspect(lease::ResourceArgs),
    /// List active leases
    List,
    /// Stream lease events until interrupted
    Watch(lease::WatchArgs),
    /// Show lease statistics
    Status,
    /// Print a fresh session token
    Token,
    /// Daemon management
    Daemon(daemon::DaemonArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        cli.output
    };
    let identity = cli.identity;

    // Commands that never talk to a running daemon
    match cli.command {
        Commands::Token => return Ok(lease::token()),
        Commands::Completions(args) => {
            completions::generate_completions::<Cli>(args.shell);
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Daemon(args) => return daemon::daemon(args, &daemon_config()?, format).await,
        _ => {}
    }

    // Reject a missing identity before spawning a daemon
    match &cli.command {
        Commands::Acquire(_) => {
            identity.holder()?;
        }
        Commands::Renew(_) => {
            identity.token()?;
        }
        _ => {}
    }

    // Everything else goes through the daemon, started on first use
    let client = DaemonClient::connect_or_start(&daemon_config()?).await?;

    match cli.command {
        Commands::Acquire(args) => lease::acquire(&client, args, &identity, format).await,
        Commands::Renew(args) => lease::renew(&client, args, &identity, format).await,
        Commands::Release(args) => lease::release(&client, args, format).await,
        Commands::Inspect(args) => lease::inspect(&client, args, &identity, format).await,
        Commands::List => lease::list(&client, format).await,
        Commands::Watch(args) => lease::watch(&client, args, format).await,
        Commands::Status => lease::status(&client, format).await,
        Commands::Token | Commands::Completions(_) | Commands::Daemon(_) => Ok(ExitCode::SUCCESS),
    }
}

/// Diagnostics go to stderr so stdout stays parseable
fn init_logging() {
    let filter = EnvFilter::try_from_env("LEASE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
