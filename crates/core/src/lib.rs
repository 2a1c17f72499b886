// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lease-core: resource leasing for record editing
//!
//! This crate provides:
//! - The lease data model and the expiry (staleness) policy
//! - The `LeaseStore` abstraction with an in-memory implementation
//! - `LeaseManager`: acquire / renew / release / inspect
//! - Best-effort change notification through an event bus
//! - Periodic sweep for storage hygiene

pub mod clock;
pub mod event;
pub mod events;
pub mod lease;
pub mod maintenance;
pub mod manager;
pub mod notify;
pub mod policy;
pub mod settings;
pub mod store;
pub mod token;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::LeaseEvent;
pub use events::{EventBus, EventReceiver, SubscriberId, Subscription, TopicPattern};
pub use lease::{
    ClientContext, Holder, HolderId, HolderInfo, Lease, LeaseKey, LeaseView, ResourceType,
    SessionToken,
};
pub use maintenance::{LeaseStats, SweepTask};
pub use manager::{AcquireOutcome, AcquireRequest, LeaseError, LeaseManager, LeaseStatus};
pub use notify::{ChangeNotifier, NotifyError};
pub use policy::ExpiryPolicy;
pub use settings::{LeaseSettings, SettingsError};
pub use store::{InsertOutcome, LeaseStore, MemoryLeaseStore, StoreError};
pub use token::{IdGen, SequentialIdGen, UuidIdGen};
