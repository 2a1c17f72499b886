// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process publish/subscribe for lease events
//!
//! This module provides:
//! - `EventBus` - Route lease events to subscribers whose patterns match
//! - `TopicPattern` - Pattern matching over `event:type:id` topics

mod bus;
mod subscription;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use subscription::{SubscriberId, Subscription, TopicPattern};
