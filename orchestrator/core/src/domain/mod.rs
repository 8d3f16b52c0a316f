// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Space identity, manifest model, name allocation, probe parsing, host
//! configuration and the ports the lifecycle manager talks through.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and rules, no I/O beyond manifest-presence checks

pub mod error;
pub mod host_config;
pub mod manifest;
pub mod name_allocator;
pub mod probe;
pub mod runtime;
pub mod space;
