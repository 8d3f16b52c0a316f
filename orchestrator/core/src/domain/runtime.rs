// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ports to the outside world: the container engine, the compose CLI and the
//! network reachability check. Infrastructure adapters implement these; the
//! lifecycle manager only sees the traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::domain::space::ContainerStats;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine answered and the object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("could not connect to container engine: {0}")]
    Connection(String),
    #[error("engine request failed: {0}")]
    Query(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

/// Host-side bindings for one container port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_ip: Option<String>,
    /// Raw host port as reported by the engine, e.g. `"32768"` or `"32768/tcp"`.
    pub host_port: String,
}

/// The slice of a container description the manager needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSnapshot {
    pub status: String,
    /// Keyed by the engine's port spec, e.g. `"22/tcp"`.
    pub ports: HashMap<String, Vec<PortBinding>>,
    /// Gateway of the first attached network, where published ports can be
    /// reached from inside the engine's network.
    pub gateway: Option<String>,
}

impl ContainerSnapshot {
    /// Resolve the host port bound to a container TCP port, `0` when unbound.
    pub fn host_port(&self, container_port: u16) -> u16 {
        self.ports
            .get(&format!("{}/tcp", container_port))
            .into_iter()
            .flatten()
            .find_map(|binding| parse_host_port(&binding.host_port))
            .unwrap_or(0)
    }
}

/// Parse the leading digits of a host port spec (`"8080"`, `"8080/tcp"`).
pub fn parse_host_port(raw: &str) -> Option<u16> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Output of a command executed inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: Option<i64>,
    pub output: String,
}

/// Container engine introspection.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Succeeds when the engine can resolve `image` locally.
    async fn inspect_image(&self, image: &str) -> Result<(), EngineError>;

    async fn inspect_container(&self, container: &str) -> Result<ContainerSnapshot, EngineError>;

    /// One decoded stats sample, not a stream.
    async fn stats(&self, container: &str) -> Result<ContainerStats, EngineError>;

    /// Run `cmd` inside `container` and collect its combined output.
    async fn exec(&self, container: &str, cmd: &[String]) -> Result<ExecOutput, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    Up,
    Down,
    Stop,
}

impl ComposeAction {
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            ComposeAction::Up => &["up", "-d"],
            ComposeAction::Down => &["down"],
            ComposeAction::Stop => &["stop"],
        }
    }
}

impl fmt::Display for ComposeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}

#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error while running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} timed out after {timeout:?}")]
    Timeout {
        command: String,
        timeout: Duration,
        output: String,
    },
}

impl InvokerError {
    pub fn output(&self) -> &str {
        match self {
            InvokerError::Timeout { output, .. } => output,
            _ => "",
        }
    }
}

/// Result of a finished orchestration command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr.
    pub output: String,
}

impl InvocationOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs the compose CLI against a manifest directory.
///
/// `project` is passed explicitly so spaces with the same name under
/// different users never share a compose project. Never inspects the output;
/// callers decide success from the exit code.
#[async_trait]
pub trait ComposeInvoker: Send + Sync {
    async fn invoke(&self, project: &str, dir: &Path, action: ComposeAction)
        -> Result<InvocationOutput, InvokerError>;
}

/// Direct TCP reachability check from the manager's network position.
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    async fn is_open(&self, host: &str, port: u16) -> bool;
}
