// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Picks a free, human-readable space name for a user.
//!
//! Occupancy is decided by the presence of a manifest on disk; the allocator
//! holds no state of its own.

use std::path::Path;

use crate::domain::manifest::MANIFEST_FILE;

pub const DEFAULT_SPACE_NAMES: &[&str] = &[
    "grover", "elmo", "bert", "ernie", "cookie", "bigbird", "count",
];

/// First candidate without a manifest under `user_dir`, in pool order.
pub fn pick_name<'a>(user_dir: &Path, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|name| !user_dir.join(name).join(MANIFEST_FILE).exists())
}
