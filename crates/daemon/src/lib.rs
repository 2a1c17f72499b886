// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Lease daemon library: wire protocol, connection handling, lifecycle.

pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use lifecycle::{Config, LifecycleError};
pub use protocol::{ProtocolError, Request, Response};
pub use server::ServerContext;
