// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake change notifier for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use lease_core::{ChangeNotifier, LeaseEvent, NotifyError};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct FakeState {
    events: Vec<LeaseEvent>,
    failure: Option<String>,
}

/// Records published events; can be told to fail
#[derive(Clone, Default)]
pub struct FakeNotifier {
    state: Arc<Mutex<FakeState>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded events
    pub fn events(&self) -> Vec<LeaseEvent> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .events
            .clone()
    }

    /// Topics of all recorded events, in publish order
    pub fn topics(&self) -> Vec<String> {
        self.events().iter().map(LeaseEvent::topic).collect()
    }

    /// Make subsequent publishes fail (and not record)
    pub fn set_failure(&self, message: impl Into<String>) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).failure = Some(message.into());
    }

    pub fn clear_failure(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).failure = None;
    }
}

#[async_trait]
impl ChangeNotifier for FakeNotifier {
    async fn publish(&self, event: &LeaseEvent) -> Result<(), NotifyError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(message) = &state.failure {
            return Err(NotifyError::Failed(message.clone()));
        }
        state.events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
