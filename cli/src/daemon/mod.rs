// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Server mode
//!
//! Handles:
//! - Wiring the lifecycle manager to its Docker and compose adapters
//! - Optional Prometheus listener
//! - Graceful shutdown

pub mod server;

pub use server::{start_server, ServerOptions};
