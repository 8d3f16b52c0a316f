// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Space identity, creation requests and observed instance status.
//!
//! A space is addressed by its `(user, name)` pair. Everything else about it
//! (directory, container names, volume name) is derived from that pair by
//! pure functions, so there is never a stored table that can drift from disk.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Container port the workspace SSH daemon listens on.
pub const SSH_CONTAINER_PORT: u16 = 22;

/// Lifecycle status strings reported by the engine that the manager acts on.
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_EXITED: &str = "exited";
pub const STATUS_STOPPED: &str = "stopped";
pub const STATUS_CREATED: &str = "created";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceIdentity {
    pub user: String,
    pub name: String,
}

impl SpaceIdentity {
    pub fn new(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            name: name.into(),
        }
    }

    /// Name of the user workspace container.
    pub fn workspace_container(&self) -> String {
        format!("space-{}-{}", self.user, self.name)
    }

    /// Name of the privileged Docker-in-Docker sidecar.
    pub fn sidecar_container(&self) -> String {
        format!("dind-{}-{}", self.user, self.name)
    }

    /// Hostname given to the workspace container.
    pub fn hostname(&self) -> String {
        format!("{}-{}", self.user, self.name)
    }

    /// Named volume holding the user's home directory.
    pub fn home_volume(&self) -> String {
        format!("{}-{}-volume", self.user, self.name)
    }

    /// Compose project the space's containers are grouped under.
    pub fn project_name(&self) -> String {
        format!("{}-{}", self.user, self.name)
    }

    /// Both parts become path segments, container names and the compose
    /// project name. The user part may not contain `-`, so every derived
    /// `{prefix}-{user}-{name}` splits back into exactly one identity.
    pub fn validate(&self) -> Result<(), String> {
        validate_segment("user", &self.user, &['_'])?;
        validate_segment("name", &self.name, &['_', '-'])
    }
}

/// Lowercase ASCII letters and digits, plus `extra`, starting with a letter
/// or digit.
pub fn validate_segment(field: &str, value: &str, extra: &[char]) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} cannot be empty", field));
    }
    if !value.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return Err(format!("{} '{}' must start with a lowercase letter or digit", field, value));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || extra.contains(c)))
    {
        return Err(format!("{} '{}' contains invalid character '{}'", field, value, c));
    }
    Ok(())
}

/// Validate a bare user segment, as used by `list` and unnamed `create`.
pub fn validate_user(user: &str) -> Result<(), String> {
    validate_segment("user", user, &['_'])
}

impl fmt::Display for SpaceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.name)
    }
}

/// Input to `Create`.
///
/// `name` may be empty, in which case the manager allocates one from the
/// candidate pool. Port fields of `0` mean "pick a free host port".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRequest {
    pub user: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub ssh_port: u16,
    #[serde(default)]
    pub vscode_port: u16,
}

impl SpaceRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_pubkey(mut self, pubkey: impl Into<String>) -> Self {
        self.pubkey = Some(pubkey.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// A service port discovered inside a running space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePort {
    pub label: String,
    pub message: String,
    /// Host port the service is directly reachable on, `0` when it is only
    /// reachable through an SSH tunnel.
    pub port: u16,
    /// Port the service listens on inside the workspace container.
    pub remote_port: u16,
}

/// Memory and CPU counters from a single stats sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub memory_stats: MemoryStats,
    pub cpu_stats: CpuStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub usage: u64,
    pub max_usage: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStats {
    pub total_usage: u64,
    pub usage_in_kernelmode: u64,
    pub usage_in_usermode: u64,
    pub system_cpu_usage: u64,
    pub online_cpus: u64,
}

/// Live view of a space, recomputed on every `Get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub user: String,
    pub name: String,
    pub ssh_port: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<InstancePort>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_stats: Option<ContainerStats>,
}

impl InstanceStatus {
    pub fn identity(&self) -> SpaceIdentity {
        SpaceIdentity::new(&self.user, &self.name)
    }

    pub fn is_running(&self) -> bool {
        self.status == STATUS_RUNNING
    }
}
