// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for routing lease events to subscribers

use super::subscription::{SubscriberId, Subscription};
use crate::event::LeaseEvent;
use crate::notify::{ChangeNotifier, NotifyError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Sender for event delivery
pub type EventSender = mpsc::UnboundedSender<LeaseEvent>;
/// Receiver for event delivery
pub type EventReceiver = mpsc::UnboundedReceiver<LeaseEvent>;

/// The event bus routes events to matching subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<SubscriberId, (Subscription, EventSender)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events matching the subscription's patterns
    ///
    /// Re-using an id replaces the previous subscription.
    pub fn subscribe(&self, subscription: Subscription) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = subscription.id.clone();

        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.insert(id, (subscription, tx));

        rx
    }

    /// Unsubscribe from events
    pub fn unsubscribe(&self, id: &SubscriberId) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.remove(id);
    }

    /// Deliver an event to every matching subscriber, returning how many got it
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub fn dispatch(&self, event: &LeaseEvent) -> usize {
        let topic = event.topic();
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, (subscription, tx)) in subs.iter() {
                if !subscription.matches(&topic) {
                    continue;
                }
                if tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(id.clone());
                }
            }
        }

        if !closed.is_empty() {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            for id in &closed {
                subs.remove(id);
            }
            tracing::debug!(removed = closed.len(), "dropped closed subscribers");
        }

        delivered
    }

    /// Get count of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl ChangeNotifier for EventBus {
    async fn publish(&self, event: &LeaseEvent) -> Result<(), NotifyError> {
        let delivered = self.dispatch(event);
        tracing::trace!(topic = %event.topic(), delivered, "event dispatched");
        Ok(())
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
