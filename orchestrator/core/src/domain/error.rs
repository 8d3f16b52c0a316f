// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy surfaced by the space lifecycle manager.
//!
//! Every variant is a distinct, inspectable condition. The HTTP layer maps
//! them to status codes; the manager never retries any of them.

use crate::domain::space::{InstanceStatus, SpaceIdentity};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("space {0} not found")]
    NotFound(SpaceIdentity),

    /// The manifest is present and the engine resolves the instance.
    #[error("space {} already exists", .0.identity())]
    AlreadyExists(Box<InstanceStatus>),

    #[error("invalid space identity: {0}")]
    InvalidIdentity(String),

    #[error("image {0} not found")]
    ImageNotFound(String),

    #[error("no name was provided for user {0} and all default names are in use")]
    NoNameAvailable(String),

    #[error("cannot {operation} space {identity} in status '{status}'")]
    InvalidState {
        identity: SpaceIdentity,
        operation: &'static str,
        status: String,
    },

    /// The orchestration command ran and failed; `output` is its combined
    /// stdout/stderr.
    #[error("{command} failed for {identity}: {reason}")]
    ProcessFailure {
        identity: SpaceIdentity,
        command: String,
        reason: String,
        output: String,
    },

    #[error("engine query failed: {0}")]
    EngineQuery(String),

    /// Manifest exists but the engine has no matching container.
    #[error("space {identity} is inconsistent: {detail}")]
    Inconsistent {
        identity: SpaceIdentity,
        detail: String,
    },

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode manifest: {0}")]
    ManifestEncoding(#[from] serde_yaml::Error),
}

impl SpaceError {
    /// Captured process output, if this error carries any.
    pub fn output(&self) -> Option<&str> {
        match self {
            SpaceError::ProcessFailure { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Short stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SpaceError::NotFound(_) => "not_found",
            SpaceError::AlreadyExists(_) => "already_exists",
            SpaceError::InvalidIdentity(_) => "invalid_identity",
            SpaceError::ImageNotFound(_) => "image_not_found",
            SpaceError::NoNameAvailable(_) => "no_name_available",
            SpaceError::InvalidState { .. } => "invalid_state",
            SpaceError::ProcessFailure { .. } => "process_failure",
            SpaceError::EngineQuery(_) => "engine_query",
            SpaceError::Inconsistent { .. } => "inconsistent",
            SpaceError::Io(_) => "io",
            SpaceError::ManifestEncoding(_) => "manifest_encoding",
        }
    }
}
