// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change notifier: best-effort fan-out of lease events
//!
//! Delivery is at-most-once. Observers must still poll `inspect`; a failed
//! publish is logged by the manager and never changes an operation's result.

use crate::event::LeaseEvent;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier closed")]
    Closed,
    #[error("notification failed: {0}")]
    Failed(String),
}

/// Publishes lease change events to interested observers
#[async_trait]
pub trait ChangeNotifier: Clone + Send + Sync + 'static {
    async fn publish(&self, event: &LeaseEvent) -> Result<(), NotifyError>;
}
