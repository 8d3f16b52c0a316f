// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod space_manager;

pub use space_manager::{CreatedSpace, SpaceLifecycleService, SpaceManagerSettings, StandardSpaceManager};
