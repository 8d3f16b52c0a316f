// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`devspace-core`)
//!
//! HTTP surface that translates external requests into lifecycle manager
//! calls. **No business logic lives here**: all real work is delegated to
//! [`crate::application::SpaceLifecycleService`].
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | REST endpoints for creating, inspecting and tearing down spaces |

pub mod api;
