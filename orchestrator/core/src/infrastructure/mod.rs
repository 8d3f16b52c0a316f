// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod compose;
pub mod ports;
pub mod runtime;
pub mod space_store;
pub mod tcp_probe;
