// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use crate::events::{EventBus, EventReceiver, Subscription, TopicPattern};
use crate::notify::NotifyError;
use crate::store::MemoryLeaseStore;
use async_trait::async_trait;
use std::time::Duration;

type TestManager<N = EventBus> = LeaseManager<MemoryLeaseStore, N, FakeClock>;

fn holder(name: &str) -> Holder {
    Holder::new(
        name,
        format!("{} Example", name),
        "project manager",
        SessionToken::new(format!("session-{}", name)),
    )
}

fn token(name: &str) -> SessionToken {
    SessionToken::new(format!("session-{}", name))
}

fn setup() -> (TestManager, MemoryLeaseStore, FakeClock, EventReceiver) {
    let store = MemoryLeaseStore::default();
    let clock = FakeClock::new();
    let bus = EventBus::new();
    let rx = bus.subscribe(Subscription::new("test", vec![TopicPattern::all()]));
    let manager = LeaseManager::new(store.clone(), bus, clock.clone());
    (manager, store, clock, rx)
}

fn acquire_p1(name: &str) -> AcquireRequest {
    AcquireRequest::new(ResourceType::Project, "P1", holder(name))
}

#[tokio::test]
async fn acquire_free_resource_is_granted() {
    let (manager, _store, clock, mut rx) = setup();

    let outcome = manager.acquire(acquire_p1("alice")).await.unwrap();
    match outcome {
        AcquireOutcome::Granted { lease, renewed } => {
            assert!(!renewed);
            assert_eq!(lease.acquired_at, clock.now());
            assert_eq!(lease.last_activity, clock.now());
        }
        other => panic!("expected grant, got {:?}", other),
    }

    let event = rx.try_recv().unwrap();
    assert_eq!(event.topic(), "lease_acquired:project:P1");
}

#[tokio::test]
async fn acquire_held_resource_is_denied_with_current_holder() {
    let (manager, _store, _clock, _rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();

    let outcome = manager.acquire(acquire_p1("bob")).await.unwrap();
    match outcome {
        AcquireOutcome::Denied { current } => {
            assert_eq!(current.holder.id.0, "alice");
            assert_eq!(current.holder.name, "alice Example");
            assert_eq!(current.holder.role, "project manager");
        }
        other => panic!("expected denial, got {:?}", other),
    }
}

#[tokio::test]
async fn same_session_acquire_twice_renews_single_record() {
    let (manager, store, clock, mut rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();
    let _ = rx.try_recv();

    clock.advance(Duration::from_secs(120));
    let outcome = manager.acquire(acquire_p1("alice")).await.unwrap();

    match outcome {
        AcquireOutcome::Granted { lease, renewed } => {
            assert!(renewed);
            assert_eq!(lease.last_activity, clock.now());
            assert!(lease.acquired_at < lease.last_activity);
        }
        other => panic!("expected grant, got {:?}", other),
    }
    assert_eq!(store.record_count(), 1);
    // Renewal is not a change of holder
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn same_user_in_another_session_is_denied() {
    let (manager, _store, _clock, _rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();

    let other_tab = Holder::new("alice", "alice Example", "project manager", SessionToken::new("tab-2"));
    let outcome = manager
        .acquire(AcquireRequest::new(ResourceType::Project, "P1", other_tab))
        .await
        .unwrap();
    assert!(!outcome.is_granted());
}

#[tokio::test]
async fn renew_refreshes_only_for_owner() {
    let (manager, _store, clock, _rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();
    clock.advance(Duration::from_secs(600));

    assert!(!manager.renew(ResourceType::Project, "P1", &token("bob")).await.unwrap());
    assert!(manager.renew(ResourceType::Project, "P1", &token("alice")).await.unwrap());

    let status = manager
        .inspect(ResourceType::Project, "P1", Some(&token("alice")))
        .await
        .unwrap();
    assert_eq!(status.last_activity, Some(clock.now()));
}

#[tokio::test]
async fn renew_of_missing_lease_is_false_not_error() {
    let (manager, _store, _clock, _rx) = setup();
    let renewed = manager
        .renew(ResourceType::Vehicle, "V1", &token("alice"))
        .await
        .unwrap();
    assert!(!renewed);
}

#[tokio::test]
async fn heartbeat_keeps_lease_alive_past_timeout() {
    let (manager, _store, clock, _rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();

    for _ in 0..20 {
        clock.advance(Duration::from_secs(14 * 60));
        assert!(manager.renew(ResourceType::Project, "P1", &token("alice")).await.unwrap());
    }

    assert!(!manager.acquire(acquire_p1("bob")).await.unwrap().is_granted());
}

#[tokio::test]
async fn passive_expiry_lets_another_holder_acquire() {
    let (manager, _store, clock, _rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();

    clock.advance(Duration::from_secs(15 * 60 + 1));
    let outcome = manager.acquire(acquire_p1("bob")).await.unwrap();
    match outcome {
        AcquireOutcome::Granted { lease, renewed } => {
            assert!(!renewed);
            assert_eq!(lease.holder.id.0, "bob");
        }
        other => panic!("expected grant, got {:?}", other),
    }
}

#[tokio::test]
async fn stale_holder_cannot_renew() {
    let (manager, _store, clock, _rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();
    clock.advance(Duration::from_secs(16 * 60));

    assert!(!manager.renew(ResourceType::Project, "P1", &token("alice")).await.unwrap());
}

#[tokio::test]
async fn release_by_anyone_frees_resource() {
    let (manager, _store, _clock, mut rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();
    let _ = rx.try_recv();

    let released = manager.release(ResourceType::Project, "P1").await.unwrap();
    assert_eq!(released, 1);
    let event = rx.try_recv().unwrap();
    assert_eq!(event.topic(), "lease_released:project:P1");

    assert!(manager.acquire(acquire_p1("carol")).await.unwrap().is_granted());
}

#[tokio::test]
async fn release_of_missing_lease_returns_zero_without_event() {
    let (manager, _store, _clock, mut rx) = setup();
    assert_eq!(manager.release(ResourceType::Employee, "E1").await.unwrap(), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn inspect_reports_viewer_ownership() {
    let (manager, _store, clock, _rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();

    let own = manager
        .inspect(ResourceType::Project, "P1", Some(&token("alice")))
        .await
        .unwrap();
    assert!(own.active);
    assert!(own.is_own_lease);

    let other = manager
        .inspect(ResourceType::Project, "P1", Some(&token("bob")))
        .await
        .unwrap();
    assert!(other.active);
    assert!(!other.is_own_lease);
    assert_eq!(other.holder.unwrap().id.0, "alice");
    assert_eq!(other.locked_at, Some(clock.now()));
    assert_eq!(
        other.expires_at,
        Some(clock.now() + chrono::Duration::minutes(15))
    );

    let anonymous = manager.inspect(ResourceType::Project, "P1", None).await.unwrap();
    assert!(anonymous.active);
    assert!(!anonymous.is_own_lease);
}

#[tokio::test]
async fn inspect_free_resource() {
    let (manager, _store, _clock, _rx) = setup();
    let status = manager
        .inspect(ResourceType::Project, "P1", Some(&token("alice")))
        .await
        .unwrap();
    assert_eq!(status, LeaseStatus::default());
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let (manager, _store, _clock, _rx) = setup();

    let err = manager
        .acquire(AcquireRequest::new(ResourceType::Project, " ", holder("alice")))
        .await
        .unwrap_err();
    assert!(matches!(err, LeaseError::InvalidRequest(_)));

    let anonymous = Holder::new("alice", "Alice", "editor", SessionToken::new(""));
    let err = manager
        .acquire(AcquireRequest::new(ResourceType::Project, "P1", anonymous))
        .await
        .unwrap_err();
    assert!(matches!(err, LeaseError::InvalidRequest(_)));

    let err = manager.release(ResourceType::Project, "").await.unwrap_err();
    assert!(matches!(err, LeaseError::InvalidRequest(_)));
}

#[tokio::test]
async fn list_active_hides_tokens() {
    let (manager, _store, _clock, _rx) = setup();
    manager.acquire(acquire_p1("alice")).await.unwrap();
    manager
        .acquire(AcquireRequest::new(ResourceType::Vehicle, "V1", holder("bob")))
        .await
        .unwrap();

    let views = manager.list_active().await.unwrap();
    assert_eq!(views.len(), 2);
    let json = serde_json::to_string(&views).unwrap();
    assert!(!json.contains("session-"));
}

#[derive(Clone)]
struct FailingNotifier;

#[async_trait]
impl ChangeNotifier for FailingNotifier {
    async fn publish(&self, _event: &LeaseEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Failed("broker down".to_string()))
    }
}

#[tokio::test]
async fn notifier_failure_does_not_affect_result() {
    let store = MemoryLeaseStore::default();
    let manager: TestManager<FailingNotifier> =
        LeaseManager::new(store, FailingNotifier, FakeClock::new());

    assert!(manager.acquire(acquire_p1("alice")).await.unwrap().is_granted());
    assert_eq!(manager.release(ResourceType::Project, "P1").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_have_exactly_one_winner() {
    let (manager, _store, _clock, _rx) = setup();

    let mut handles = Vec::new();
    for i in 0..32 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .acquire(acquire_p1(&format!("user{}", i)))
                .await
                .unwrap()
        }));
    }

    let mut winner = None;
    let mut denied_by = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            AcquireOutcome::Granted { lease, .. } => {
                assert!(winner.is_none(), "two holders were granted the lease");
                winner = Some(lease.holder.id);
            }
            AcquireOutcome::Denied { current } => denied_by.push(current.holder.id),
        }
    }

    let winner = winner.unwrap();
    assert_eq!(denied_by.len(), 31);
    assert!(denied_by.iter().all(|id| *id == winner));
}

#[tokio::test]
async fn scenario_release_hands_over_to_waiting_user() {
    let (manager, _store, _clock, _rx) = setup();

    assert!(manager.acquire(acquire_p1("A")).await.unwrap().is_granted());

    let seen_by_b = manager
        .inspect(ResourceType::Project, "P1", Some(&token("B")))
        .await
        .unwrap();
    assert!(seen_by_b.active);
    assert!(!seen_by_b.is_own_lease);
    assert_eq!(seen_by_b.holder.unwrap().id.0, "A");

    match manager.acquire(acquire_p1("B")).await.unwrap() {
        AcquireOutcome::Denied { current } => assert_eq!(current.holder.id.0, "A"),
        other => panic!("expected denial, got {:?}", other),
    }

    manager.release(ResourceType::Project, "P1").await.unwrap();
    assert!(manager.acquire(acquire_p1("B")).await.unwrap().is_granted());
}

#[tokio::test]
async fn scenario_expiry_hands_over_and_old_holder_sees_it() {
    let (manager, _store, clock, _rx) = setup();

    assert!(manager.acquire(acquire_p1("A")).await.unwrap().is_granted());
    clock.advance(Duration::from_secs(16 * 60));
    assert!(manager.acquire(acquire_p1("B")).await.unwrap().is_granted());

    let seen_by_a = manager
        .inspect(ResourceType::Project, "P1", Some(&token("A")))
        .await
        .unwrap();
    assert!(seen_by_a.active);
    assert!(!seen_by_a.is_own_lease);
    assert_eq!(seen_by_a.holder.unwrap().id.0, "B");
}
