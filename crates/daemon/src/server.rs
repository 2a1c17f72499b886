// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::sync::Arc;
use std::time::Instant;

use lease_adapters::TracedNotifier;
use lease_core::{
    AcquireOutcome, AcquireRequest, Clock, EventBus, IdGen, LeaseManager, LeaseSettings,
    LeaseStats, LeaseStore, Subscription, TopicPattern, UuidIdGen,
};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Lease manager as wired inside the daemon: events go to the watch bus
pub type DaemonManager<S, C> = LeaseManager<S, TracedNotifier<EventBus>, C>;

/// Everything a connection task needs; cheap to clone
#[derive(Clone)]
pub struct ServerContext<S, C> {
    manager: DaemonManager<S, C>,
    bus: EventBus,
    settings: LeaseSettings,
    start_time: Instant,
    shutdown: Arc<Notify>,
}

impl<S: LeaseStore, C: Clock> ServerContext<S, C> {
    pub fn new(store: S, clock: C, settings: LeaseSettings) -> Self {
        let bus = EventBus::new();
        let manager = LeaseManager::new(store, TracedNotifier::new(bus.clone()), clock);
        Self {
            manager,
            bus,
            settings,
            start_time: Instant::now(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn manager(&self) -> &DaemonManager<S, C> {
        &self.manager
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn settings(&self) -> &LeaseSettings {
        &self.settings
    }

    /// Notified once when a client sends `Shutdown`
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }
}

/// Handle a single client connection
pub async fn handle_connection<S: LeaseStore, C: Clock>(
    ctx: ServerContext<S, C>,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            let response = Response::error(format!("invalid request: {}", e));
            let _ = protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await;
            return Err(ServerError::Protocol(e));
        }
    };

    debug!(?request, "Received request");

    if let Request::Watch { pattern } = request {
        return stream_events(&ctx, &pattern, reader, writer).await;
    }

    let response = handle_request(&ctx, request).await;

    debug!(?response, "Sending response");

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
pub async fn handle_request<S: LeaseStore, C: Clock>(
    ctx: &ServerContext<S, C>,
    request: Request,
) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                debug!(client = %version, daemon = PROTOCOL_VERSION, "protocol version mismatch");
            }
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
                lease_timeout_secs: ctx.manager.policy().lease_timeout().as_secs(),
                heartbeat_interval_secs: ctx.settings.heartbeat_interval.as_secs(),
            }
        }

        Request::Acquire {
            resource_type,
            resource_id,
            holder,
            client,
        } => {
            let request = AcquireRequest::new(resource_type, resource_id, holder).with_client(client);
            match ctx.manager.acquire(request).await {
                Ok(AcquireOutcome::Granted { lease, renewed }) => Response::Acquired {
                    lease: lease.view(),
                    renewed,
                },
                Ok(AcquireOutcome::Denied { current }) => Response::Denied {
                    denied_by: current.holder,
                    locked_at: current.locked_at,
                    last_activity: current.last_activity,
                },
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::Renew {
            resource_type,
            resource_id,
            token,
        } => match ctx.manager.renew(resource_type, &resource_id, &token).await {
            Ok(updated) => Response::Renewed { updated },
            Err(e) => Response::error(e.to_string()),
        },

        Request::Release {
            resource_type,
            resource_id,
        } => match ctx.manager.release(resource_type, &resource_id).await {
            Ok(released_count) => Response::Released { released_count },
            Err(e) => Response::error(e.to_string()),
        },

        Request::Inspect {
            resource_type,
            resource_id,
            token,
        } => match ctx
            .manager
            .inspect(resource_type, &resource_id, token.as_ref())
            .await
        {
            Ok(status) => Response::Lease { status },
            Err(e) => Response::error(e.to_string()),
        },

        Request::List => match ctx.manager.list_active().await {
            Ok(leases) => Response::Leases { leases },
            Err(e) => Response::error(e.to_string()),
        },

        // Streams are only served from handle_connection
        Request::Watch { .. } => Response::error("watch needs a dedicated connection"),

        Request::Status => {
            match LeaseStats::collect(ctx.manager.store(), ctx.manager.clock()).await {
                Ok(leases) => Response::Status {
                    uptime_secs: ctx.start_time.elapsed().as_secs(),
                    leases,
                    watchers: ctx.bus.subscriber_count(),
                    heartbeat_interval_secs: ctx.settings.heartbeat_interval.as_secs(),
                },
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

/// Push matching events to a watcher until it disconnects
async fn stream_events<S: LeaseStore, C: Clock>(
    ctx: &ServerContext<S, C>,
    pattern: &str,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
) -> Result<(), ServerError> {
    let pattern = if pattern.trim().is_empty() {
        TopicPattern::all()
    } else {
        TopicPattern::new(pattern.trim())
    };
    let subscription = Subscription::new(format!("watch-{}", UuidIdGen.next()), vec![pattern]);
    let subscriber = subscription.id.clone();
    let mut events = ctx.bus.subscribe(subscription);
    debug!(subscriber = %subscriber.0, "watcher attached");

    let result = async {
        protocol::write_response(&mut writer, &Response::Ok, DEFAULT_TIMEOUT).await?;
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    protocol::write_response(&mut writer, &Response::Event { event }, DEFAULT_TIMEOUT)
                        .await?;
                }
                // Watchers send nothing after the request; any read result means they left
                _ = protocol::read_message(&mut reader) => break,
            }
        }
        Ok::<(), ServerError>(())
    }
    .await;

    ctx.bus.unsubscribe(&subscriber);
    debug!(subscriber = %subscriber.0, "watcher detached");
    result
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
