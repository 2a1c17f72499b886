// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change notifier implementations

#[cfg(any(test, feature = "test-support"))]
mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNotifier;

use async_trait::async_trait;
use lease_core::{ChangeNotifier, LeaseEvent, NotifyError};

/// Notifier that drops every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpNotifier;

impl NoOpNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChangeNotifier for NoOpNotifier {
    async fn publish(&self, _event: &LeaseEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
