// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{Clock, FakeClock};
use crate::lease::{ClientContext, Holder, LeaseKey, ResourceType, SessionToken};

fn lease_at(clock: &FakeClock) -> Lease {
    Lease::new(
        LeaseKey::new(ResourceType::Project, "P1"),
        Holder::new("alice", "Alice", "editor", SessionToken::new("tok-a")),
        ClientContext::default(),
        clock.now(),
    )
}

#[test]
fn defaults_match_documented_values() {
    let policy = ExpiryPolicy::default();
    assert_eq!(policy.lease_timeout(), Duration::from_secs(900));
    assert_eq!(policy.purge_grace(), Duration::from_secs(1800));
}

#[test]
fn lease_is_active_just_before_timeout() {
    let clock = FakeClock::new();
    let policy = ExpiryPolicy::default();
    let lease = lease_at(&clock);

    clock.advance(Duration::from_secs(899));
    assert!(policy.is_active(&lease, clock.now()));
}

#[test]
fn lease_is_stale_at_exact_timeout() {
    let clock = FakeClock::new();
    let policy = ExpiryPolicy::default();
    let lease = lease_at(&clock);

    clock.advance(Duration::from_secs(900));
    assert!(policy.is_stale(&lease, clock.now()));
}

#[test]
fn clock_behind_last_activity_counts_as_active() {
    let clock = FakeClock::new();
    let policy = ExpiryPolicy::default();
    let lease = lease_at(&clock);

    clock.rewind(Duration::from_secs(3600));
    assert!(policy.is_active(&lease, clock.now()));
}

#[test]
fn purge_grace_never_shorter_than_timeout() {
    let policy = ExpiryPolicy::new(Duration::from_secs(600), Duration::from_secs(60));
    assert_eq!(policy.purge_grace(), Duration::from_secs(600));

    let policy = ExpiryPolicy::default().with_lease_timeout(Duration::from_secs(3600));
    assert_eq!(policy.purge_grace(), Duration::from_secs(3600));
}

#[test]
fn stale_lease_becomes_purgeable_after_grace() {
    let clock = FakeClock::new();
    let policy = ExpiryPolicy::default();
    let lease = lease_at(&clock);

    clock.advance(Duration::from_secs(16 * 60));
    assert!(policy.is_stale(&lease, clock.now()));
    assert!(!policy.is_purgeable(&lease, clock.now()));

    clock.advance(Duration::from_secs(15 * 60));
    assert!(policy.is_purgeable(&lease, clock.now()));
}

#[test]
fn expires_at_is_last_activity_plus_timeout() {
    let clock = FakeClock::new();
    let policy = ExpiryPolicy::default();
    let mut lease = lease_at(&clock);

    clock.advance(Duration::from_secs(120));
    lease.touch(clock.now());

    let expected = clock.now() + chrono::Duration::seconds(900);
    assert_eq!(policy.expires_at(&lease), expected);
}

use proptest::prelude::*;

proptest! {
    #[test]
    fn heartbeat_faster_than_timeout_never_expires(
        interval_secs in 1u64..900,
        beats in 1usize..200,
    ) {
        let clock = FakeClock::new();
        let policy = ExpiryPolicy::default();
        let mut lease = lease_at(&clock);

        for _ in 0..beats {
            clock.advance(Duration::from_secs(interval_secs));
            prop_assert!(policy.is_active(&lease, clock.now()));
            lease.touch(clock.now());
        }
        prop_assert!(policy.is_active(&lease, clock.now()));
    }
}
