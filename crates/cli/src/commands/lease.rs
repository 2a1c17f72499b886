// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease commands: acquire, renew, release, inspect, list, watch, status

use std::process::ExitCode;

use anyhow::{bail, Result};
use lease_core::{
    ClientContext, Holder, IdGen, LeaseKey, ResourceType, SessionToken, TopicPattern, UuidIdGen,
};

use crate::client::{AcquireReply, DaemonClient};
use crate::output::{
    self, AcquireOutput, EventLine, InspectOutput, LeaseRow, OutputFormat, ReleaseOutput,
    RenewOutput, StatusOutput,
};

/// Exit code when a lease is held by someone else
pub const EXIT_DENIED: u8 = 2;

/// Who is asking
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Identity {
    /// Holder id (defaults to $USER)
    #[arg(long, env = "LEASE_USER", global = true)]
    pub user: Option<String>,

    /// Display name shown to other users
    #[arg(long, env = "LEASE_NAME", global = true)]
    pub name: Option<String>,

    /// Role shown to other users
    #[arg(long, env = "LEASE_ROLE", global = true)]
    pub role: Option<String>,

    /// Session token proving lease ownership (see `lease token`)
    #[arg(long, env = "LEASE_SESSION", global = true, hide_env_values = true)]
    pub session: Option<String>,
}

impl Identity {
    pub fn token(&self) -> Result<SessionToken> {
        match self.session.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(SessionToken::new(token)),
            _ => bail!(
                "no session token: pass --session or set LEASE_SESSION (generate one with `lease token`)"
            ),
        }
    }

    /// Token if one was given; inspect works without it
    pub fn optional_token(&self) -> Option<SessionToken> {
        self.token().ok()
    }

    pub fn holder(&self) -> Result<Holder> {
        let token = self.token()?;
        let user = match self.user.clone().or_else(|| std::env::var("USER").ok()) {
            Some(user) if !user.trim().is_empty() => user,
            _ => bail!("no user: pass --user or set LEASE_USER"),
        };
        let name = self.name.clone().unwrap_or_else(|| user.clone());
        let role = self.role.clone().unwrap_or_default();
        Ok(Holder::new(user, name, role, token))
    }
}

/// A single record
#[derive(clap::Args, Debug)]
pub struct ResourceArgs {
    /// Resource type: project, employee or vehicle
    pub resource_type: ResourceType,

    /// Record identifier
    pub resource_id: String,
}

impl ResourceArgs {
    pub fn key(&self) -> LeaseKey {
        LeaseKey::new(self.resource_type, self.resource_id.clone())
    }
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// Only events for this resource type
    pub resource_type: Option<ResourceType>,

    /// Only events for this record
    #[arg(requires = "resource_type")]
    pub resource_id: Option<String>,
}

impl WatchArgs {
    pub fn pattern(&self) -> TopicPattern {
        match (&self.resource_type, &self.resource_id) {
            (Some(resource_type), Some(id)) => TopicPattern::for_resource(*resource_type, id),
            (Some(resource_type), None) => TopicPattern::for_type(*resource_type),
            _ => TopicPattern::all(),
        }
    }
}

pub async fn acquire(
    client: &DaemonClient,
    args: ResourceArgs,
    identity: &Identity,
    format: OutputFormat,
) -> Result<ExitCode> {
    let holder = identity.holder()?;
    let context = ClientContext::new()
        .with_origin("cli")
        .with_user_agent(concat!("lease/", env!("CARGO_PKG_VERSION")));

    match client
        .acquire(args.resource_type, &args.resource_id, holder, context)
        .await?
    {
        AcquireReply::Granted { lease, renewed } => {
            output::print(&AcquireOutput::granted(lease, renewed), format);
            Ok(ExitCode::SUCCESS)
        }
        AcquireReply::Denied {
            denied_by,
            locked_at,
            ..
        } => {
            output::print(&AcquireOutput::denied(args.key(), denied_by, locked_at), format);
            Ok(ExitCode::from(EXIT_DENIED))
        }
    }
}

pub async fn renew(
    client: &DaemonClient,
    args: ResourceArgs,
    identity: &Identity,
    format: OutputFormat,
) -> Result<ExitCode> {
    let token = identity.token()?;
    let updated = client
        .renew(args.resource_type, &args.resource_id, token)
        .await?;

    output::print(
        &RenewOutput {
            key: args.key(),
            updated,
        },
        format,
    );
    Ok(if updated {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DENIED)
    })
}

pub async fn release(
    client: &DaemonClient,
    args: ResourceArgs,
    format: OutputFormat,
) -> Result<ExitCode> {
    let released_count = client
        .release(args.resource_type, &args.resource_id)
        .await?;

    output::print(
        &ReleaseOutput {
            key: args.key(),
            released_count,
        },
        format,
    );
    Ok(ExitCode::SUCCESS)
}

pub async fn inspect(
    client: &DaemonClient,
    args: ResourceArgs,
    identity: &Identity,
    format: OutputFormat,
) -> Result<ExitCode> {
    let status = client
        .inspect(
            args.resource_type,
            &args.resource_id,
            identity.optional_token(),
        )
        .await?;

    output::print(
        &InspectOutput {
            key: args.key(),
            status,
        },
        format,
    );
    Ok(ExitCode::SUCCESS)
}

pub async fn list(client: &DaemonClient, format: OutputFormat) -> Result<ExitCode> {
    let rows: Vec<LeaseRow> = client.list().await?.into_iter().map(LeaseRow).collect();
    if format == OutputFormat::Text && !rows.is_empty() {
        println!("{:<10} {:<20} {:<30} LAST ACTIVITY", "TYPE", "ID", "HOLDER");
    }
    output::print_list(&rows, "No active leases", format);
    Ok(ExitCode::SUCCESS)
}

/// Stream events until the daemon goes away or the user interrupts
pub async fn watch(client: &DaemonClient, args: WatchArgs, format: OutputFormat) -> Result<ExitCode> {
    let pattern = args.pattern();
    let mut events = client.watch(pattern.as_str()).await?;
    tracing::debug!(pattern = pattern.as_str(), "watching");

    loop {
        tokio::select! {
            event = events.next() => match event? {
                Some(event) => output::print_line(&EventLine(event), format),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn status(client: &DaemonClient, format: OutputFormat) -> Result<ExitCode> {
    let (uptime_secs, leases, watchers) = client.status().await?;
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

/// Print a fresh session token
pub fn token() -> ExitCode {
    println!("{}", UuidIdGen.session_token().as_str());
    ExitCode::SUCCESS
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
