// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests that need no running daemon

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `lease` command isolated from the user's environment
fn lease(state_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lease").unwrap();
    cmd.env("LEASE_STATE_DIR", state_dir.path())
        .env_remove("LEASE_SOCKET_PATH")
        .env_remove("LEASE_SESSION")
        .env_remove("LEASE_USER")
        .env("LEASE_DAEMON_BINARY", state_dir.path().join("no-such-leased"))
        .env("LEASE_TIMEOUT_CONNECT_MS", "500");
    cmd
}

#[test]
fn help_lists_lease_commands() {
    let state = TempDir::new().unwrap();
    lease(&state)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("acquire"))
        .stdout(predicate::str::contains("renew"))
        .stdout(predicate::str::contains("release"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn token_prints_fresh_hex_token() {
    let state = TempDir::new().unwrap();
    let first = lease(&state).arg("token").output().unwrap();
    let second = lease(&state).arg("token").output().unwrap();
    assert!(first.status.success());

    let first = String::from_utf8(first.stdout).unwrap();
    let second = String::from_utf8(second.stdout).unwrap();
    assert_eq!(first.trim().len(), 32);
    assert!(first.trim().chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(first, second);
}

#[test]
fn daemon_status_when_not_running() {
    let state = TempDir::new().unwrap();
    lease(&state)
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon not running"));
}

#[test]
fn daemon_stop_when_not_running() {
    let state = TempDir::new().unwrap();
    lease(&state)
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon not running"));
}

#[test]
fn acquire_requires_session_token() {
    let state = TempDir::new().unwrap();
    lease(&state)
        .args(["acquire", "project", "P1", "--user", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no session token"));

    // Fails before any daemon is spawned
    assert!(!state.path().join("leased.sock").exists());
}

#[test]
fn unknown_resource_type_is_a_usage_error() {
    let state = TempDir::new().unwrap();
    lease(&state)
        .args(["inspect", "invoice", "I1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invoice"));
}

#[test]
fn missing_daemon_binary_reports_start_failure() {
    let state = TempDir::new().unwrap();
    lease(&state)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to start daemon"));
}

#[test]
fn completions_for_bash() {
    let state = TempDir::new().unwrap();
    lease(&state)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lease"));
}
