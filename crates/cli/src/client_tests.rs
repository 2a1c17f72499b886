// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use lease_core::{Clock, FakeClock, LeaseSettings, MemoryLeaseStore};
use lease_daemon::server::{handle_connection, ServerContext};
use tempfile::TempDir;
use tokio::net::UnixListener;

/// Serve connections from an in-process daemon on a temp socket
fn serve(dir: &TempDir) -> (DaemonClient, FakeClock) {
    let socket = dir.path().join("test.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let clock = FakeClock::new();
    let ctx = ServerContext::new(
        MemoryLeaseStore::default(),
        clock.clone(),
        LeaseSettings::default(),
    );

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let _ = handle_connection(ctx, stream).await;
            });
        }
    });

    (DaemonClient::at(socket), clock)
}

fn holder(name: &str) -> Holder {
    Holder::new(
        format!("u-{}", name),
        name,
        "dispatcher",
        SessionToken::new(format!("s-{}", name)),
    )
}

#[test]
fn connect_without_socket_reports_not_running() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_state_dir(dir.path());

    let err = DaemonClient::connect(&config).err().unwrap();
    assert!(matches!(err, ClientError::DaemonNotRunning));
}

#[test]
fn startup_error_is_read_from_last_attempt_only() {
    let log = "\
--- leased: starting (pid: 10)
2026-01-01T00:00:00Z ERROR leased: Failed to start daemon: old problem
--- leased: starting (pid: 11)
ERROR Failed to start daemon: Failed to acquire lock: daemon already running?
";
    let err = startup_error_from_log(log).unwrap();
    assert!(err.contains("daemon already running"), "{}", err);
    assert!(!err.contains("old problem"), "{}", err);
}

#[test]
fn clean_startup_has_no_error() {
    let log = "--- leased: starting (pid: 12)\n INFO leased: Daemon ready\n";
    assert_eq!(startup_error_from_log(log), None);
}

#[tokio::test]
async fn acquire_then_denied_for_another_session() {
    let dir = TempDir::new().unwrap();
    let (client, _) = serve(&dir);

    let first = client
        .acquire(ResourceType::Vehicle, "V7", holder("alice"), ClientContext::default())
        .await
        .unwrap();
    let second = client
        .acquire(ResourceType::Vehicle, "V7", holder("bob"), ClientContext::default())
        .await
        .unwrap();

    assert!(matches!(first, AcquireReply::Granted { renewed: false, .. }));
    match second {
        AcquireReply::Denied { denied_by, .. } => assert_eq!(denied_by.name, "alice"),
        other => panic!("expected denial, got {:?}", other),
    }
}

#[tokio::test]
async fn renew_release_and_inspect_round_trip() {
    let dir = TempDir::new().unwrap();
    let (client, clock) = serve(&dir);
    client
        .acquire(ResourceType::Project, "P1", holder("alice"), ClientContext::default())
        .await
        .unwrap();

    clock.advance(Duration::from_secs(60));
    assert!(client
        .renew(ResourceType::Project, "P1", SessionToken::new("s-alice"))
        .await
        .unwrap());

    let status = client
        .inspect(ResourceType::Project, "P1", Some(SessionToken::new("s-alice")))
        .await
        .unwrap();
    assert!(status.active);
    assert!(status.is_own_lease);
    assert_eq!(status.last_activity, Some(clock.now()));

    assert_eq!(client.release(ResourceType::Project, "P1").await.unwrap(), 1);
    let status = client.inspect(ResourceType::Project, "P1", None).await.unwrap();
    assert!(!status.active);
}

#[tokio::test]
async fn daemon_errors_surface_as_rejected() {
    let dir = TempDir::new().unwrap();
    let (client, _) = serve(&dir);

    let err = client
        .renew(ResourceType::Project, "P1", SessionToken::new(""))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)), "{:?}", err);
}

#[tokio::test]
async fn status_and_list_report_leases() {
    let dir = TempDir::new().unwrap();
    let (client, _) = serve(&dir);
    client
        .acquire(ResourceType::Employee, "E1", holder("alice"), ClientContext::default())
        .await
        .unwrap();

    let leases = client.list().await.unwrap();
    assert_eq!(leases.len(), 1);
    assert_eq!(leases[0].holder.name, "alice");

    let (_, stats, watchers) = client.status().await.unwrap();
    assert_eq!(stats.active, 1);
    assert_eq!(watchers, 0);
    assert_eq!(client.hello().await.unwrap(), env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn watch_delivers_events() {
    let dir = TempDir::new().unwrap();
    let (client, _) = serve(&dir);
    let mut events = client.watch("lease_released:**").await.unwrap();

    client
        .acquire(ResourceType::Project, "P9", holder("alice"), ClientContext::default())
        .await
        .unwrap();
    client.release(ResourceType::Project, "P9").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event.topic(), "lease_released:project:P9");
}
