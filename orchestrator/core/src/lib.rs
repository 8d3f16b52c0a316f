// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! devspace core
//!
//! Provisions, inspects and tears down per-user development spaces: a
//! Docker-in-Docker sidecar plus a workspace container, described by a
//! generated compose manifest.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, adapters and the space lifecycle manager

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
