// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Space Lifecycle Manager Application Service
//!
//! Coordinates the lifecycle of per-user spaces:
//! - Domain layer: identity derivation, manifest rendering, name allocation,
//!   probe report parsing
//! - Infrastructure layer: space directory store, compose CLI, Docker engine,
//!   TCP reachability
//!
//! The manifest directory on disk is the only record of which spaces exist.
//! Nothing is cached: every `get` re-reads the filesystem and re-queries the
//! engine. Mutating operations on one identity are serialized by an
//! in-process lock, and name allocation is serialized per user.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::domain::error::SpaceError;
use crate::domain::host_config::HostConfig;
use crate::domain::manifest::{DnsPolicy, SpaceDescriptor};
use crate::domain::name_allocator::DEFAULT_SPACE_NAMES;
use crate::domain::probe::{is_missing_executable, parse_probe_report};
use crate::domain::runtime::{
    ComposeAction, ComposeInvoker, ContainerEngine, ContainerSnapshot, EngineError, ReachabilityCheck,
};
use crate::domain::space::{
    validate_user, InstancePort, InstanceStatus, SpaceIdentity, SpaceRequest, SSH_CONTAINER_PORT,
    STATUS_CREATED, STATUS_EXITED, STATUS_RUNNING, STATUS_STOPPED,
};
use crate::infrastructure::ports::{resolve_port, HostPortSource};
use crate::infrastructure::space_store::SpaceStore;

const FALLBACK_PROBE_HOST: &str = "127.0.0.1";

// ============================================================================
// Service Trait
// ============================================================================

/// Result of a successful `create`.
#[derive(Debug, Clone)]
pub struct CreatedSpace {
    pub instance: InstanceStatus,
    /// Combined output of the bring-up command.
    pub output: String,
}

#[async_trait]
pub trait SpaceLifecycleService: Send + Sync {
    /// Provision a space, allocating a name when the request has none.
    async fn create(&self, request: SpaceRequest) -> Result<CreatedSpace, SpaceError>;

    /// Observe a space; stats are only sampled when `include_stats` is set.
    async fn get(&self, user: &str, name: &str, include_stats: bool) -> Result<InstanceStatus, SpaceError>;

    /// All spaces of a user. A user without a directory has none.
    async fn list(&self, user: &str) -> Result<Vec<InstanceStatus>, SpaceError>;

    async fn stop(&self, user: &str, name: &str) -> Result<(), SpaceError>;

    async fn start(&self, user: &str, name: &str) -> Result<(), SpaceError>;

    async fn restart(&self, user: &str, name: &str) -> Result<(), SpaceError>;

    /// Tear down the containers and delete the space directory.
    async fn kill(&self, user: &str, name: &str) -> Result<(), SpaceError>;
}

// ============================================================================
// Settings
// ============================================================================

/// Policy the manager applies to every space it provisions.
#[derive(Debug, Clone)]
pub struct SpaceManagerSettings {
    pub default_image: String,
    pub dns: DnsPolicy,
    /// Storage root holding the shared sidecar image cache.
    pub storage_root: PathBuf,
    pub probe_command: Vec<String>,
    /// Upper bound on one run of the in-container probe.
    pub probe_exec_timeout: Duration,
    pub name_pool: Vec<String>,
}

impl SpaceManagerSettings {
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            default_image: config.default_image.clone(),
            dns: config.dns_policy(),
            storage_root: config.dir.clone(),
            probe_command: config.probe_command.clone(),
            probe_exec_timeout: config.probe_exec_timeout(),
            name_pool: DEFAULT_SPACE_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardSpaceManager {
    store: SpaceStore,
    engine: Arc<dyn ContainerEngine>,
    invoker: Arc<dyn ComposeInvoker>,
    reachability: Arc<dyn ReachabilityCheck>,
    ports: Arc<dyn HostPortSource>,
    settings: SpaceManagerSettings,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl StandardSpaceManager {
    pub fn new(
        store: SpaceStore,
        engine: Arc<dyn ContainerEngine>,
        invoker: Arc<dyn ComposeInvoker>,
        reachability: Arc<dyn ReachabilityCheck>,
        ports: Arc<dyn HostPortSource>,
        settings: SpaceManagerSettings,
    ) -> Self {
        Self {
            store,
            engine,
            invoker,
            reachability,
            ports,
            settings,
            locks: DashMap::new(),
        }
    }

    async fn lock(&self, key: String) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(key).or_default().clone();
        mutex.lock_owned().await
    }

    async fn lock_user(&self, user: &str) -> OwnedMutexGuard<()> {
        self.lock(format!("user:{}", user)).await
    }

    async fn lock_space(&self, id: &SpaceIdentity) -> OwnedMutexGuard<()> {
        self.lock(format!("space:{}", id)).await
    }

    /// Drop the lock entry of a deleted space once nobody else holds it.
    fn forget_lock(&self, id: &SpaceIdentity) {
        self.locks
            .remove_if(&format!("space:{}", id), |_, mutex| Arc::strong_count(mutex) == 1);
    }

    fn identity(user: &str, name: &str) -> Result<SpaceIdentity, SpaceError> {
        let id = SpaceIdentity::new(user, name);
        id.validate().map_err(SpaceError::InvalidIdentity)?;
        Ok(id)
    }

    async fn run_compose(&self, id: &SpaceIdentity, action: ComposeAction) -> Result<String, SpaceError> {
        let dir = self.store.space_dir(id);
        match self.invoker.invoke(&id.project_name(), &dir, action).await {
            Ok(out) if out.success() => Ok(out.output),
            Ok(out) => {
                error!("`{}` failed for {}: exit {:?}\n{}", action, id, out.exit_code, out.output);
                Err(SpaceError::ProcessFailure {
                    identity: id.clone(),
                    command: action.to_string(),
                    reason: match out.exit_code {
                        Some(code) => format!("exit status {}", code),
                        None => "terminated by signal".to_string(),
                    },
                    output: out.output,
                })
            }
            Err(e) => {
                error!("`{}` failed for {}: {}", action, id, e);
                Err(SpaceError::ProcessFailure {
                    identity: id.clone(),
                    command: action.to_string(),
                    reason: e.to_string(),
                    output: e.output().to_string(),
                })
            }
        }
    }

    /// Manifest check plus container inspect, without probing ports.
    async fn observe(&self, id: &SpaceIdentity) -> Result<(InstanceStatus, ContainerSnapshot), SpaceError> {
        if !self.store.manifest_exists(id) {
            return Err(SpaceError::NotFound(id.clone()));
        }

        let container = id.workspace_container();
        let snapshot = match self.engine.inspect_container(&container).await {
            Ok(snapshot) => snapshot,
            Err(EngineError::NotFound(detail)) => {
                return Err(SpaceError::Inconsistent {
                    identity: id.clone(),
                    detail: format!("manifest present but container {} is missing ({})", container, detail),
                })
            }
            Err(e) => {
                warn!("Error inspecting {:?}: {}", container, e);
                return Err(SpaceError::EngineQuery(e.to_string()));
            }
        };

        let instance = InstanceStatus {
            user: id.user.clone(),
            name: id.name.clone(),
            ssh_port: snapshot.host_port(SSH_CONTAINER_PORT),
            ports: vec![],
            status: snapshot.status.clone(),
            container_stats: None,
        };
        Ok((instance, snapshot))
    }

    async fn inspect(&self, id: &SpaceIdentity, include_stats: bool) -> Result<InstanceStatus, SpaceError> {
        let (mut instance, snapshot) = self.observe(id).await?;

        if !instance.is_running() {
            return Ok(instance);
        }

        let container = id.workspace_container();
        instance.ports = self.probe_ports(&container, &snapshot).await?;

        if include_stats {
            match self.engine.stats(&container).await {
                Ok(stats) => instance.container_stats = Some(stats),
                Err(e) => warn!("Error getting stats for {}: {}", container, e),
            }
        }

        Ok(instance)
    }

    /// Ask the in-container helper which ports are listening, then check
    /// which of them are directly reachable through their host binding.
    async fn probe_ports(&self, container: &str, snapshot: &ContainerSnapshot) -> Result<Vec<InstancePort>, SpaceError> {
        let exec = self.engine.exec(container, &self.settings.probe_command);
        let report = match tokio::time::timeout(self.settings.probe_exec_timeout, exec).await {
            Err(_) => {
                return Err(SpaceError::EngineQuery(format!(
                    "port probe in {} timed out after {:?}",
                    container, self.settings.probe_exec_timeout
                )))
            }
            Ok(result) => result,
        };
        let report = match report {
            Ok(out) if out.exit_code.unwrap_or(0) == 0 => out.output,
            Ok(out) if is_missing_executable(&out.output) => {
                warn!("Port probe not installed in {}, reporting no ports", container);
                return Ok(vec![]);
            }
            Ok(out) => {
                return Err(SpaceError::EngineQuery(format!(
                    "port probe in {} exited with {:?}: {}",
                    container,
                    out.exit_code,
                    out.output.trim()
                )))
            }
            Err(e) if is_missing_executable(&e.to_string()) => {
                warn!("Port probe not installed in {}, reporting no ports", container);
                return Ok(vec![]);
            }
            Err(e) => return Err(SpaceError::EngineQuery(format!("port probe in {}: {}", container, e))),
        };

        let host = snapshot.gateway.as_deref().unwrap_or(FALLBACK_PROBE_HOST);
        let checks = parse_probe_report(&report).into_iter().map(|probed| async move {
            let host_port = snapshot.host_port(probed.port);
            let reachable = host_port != 0 && self.reachability.is_open(host, host_port).await;
            debug!("{} port {} -> host {} reachable: {}", container, probed.port, host_port, reachable);
            InstancePort {
                label: probed.label,
                message: probed.message,
                port: if reachable { host_port } else { 0 },
                remote_port: probed.port,
            }
        });

        Ok(join_all(checks).await)
    }

    async fn create_locked(&self, id: &SpaceIdentity, request: &SpaceRequest) -> Result<CreatedSpace, SpaceError> {
        if self.store.dir_exists(id) {
            match self.observe(id).await {
                Ok((mut instance, snapshot)) => {
                    if instance.is_running() {
                        match self.probe_ports(&id.workspace_container(), &snapshot).await {
                            Ok(ports) => instance.ports = ports,
                            Err(e) => warn!("Error probing ports of existing space {}: {}", id, e),
                        }
                    }
                    return Err(SpaceError::AlreadyExists(Box::new(instance)));
                }
                Err(e @ (SpaceError::NotFound(_) | SpaceError::Inconsistent { .. })) => {
                    debug!("Existing directory for {} does not resolve ({}), provisioning", id, e)
                }
                Err(e) => return Err(e),
            }
        }

        let image = request
            .image
            .as_deref()
            .map(str::trim)
            .filter(|image| !image.is_empty())
            .unwrap_or(&self.settings.default_image)
            .to_string();

        match self.engine.inspect_image(&image).await {
            Ok(()) => {}
            Err(EngineError::NotFound(_)) => return Err(SpaceError::ImageNotFound(image)),
            Err(e) => return Err(SpaceError::EngineQuery(e.to_string())),
        }

        let descriptor = SpaceDescriptor {
            identity: id.clone(),
            image,
            password: request.password.clone().unwrap_or_default(),
            pubkey: request.pubkey.clone().filter(|key| !key.is_empty()),
            ssh_port: resolve_port(self.ports.as_ref(), request.ssh_port)?,
            vscode_port: resolve_port(self.ports.as_ref(), request.vscode_port)?,
            projector_port: self.ports.free_port()?,
            root: self.settings.storage_root.clone(),
            dns: self.settings.dns.clone(),
        };

        info!("Creating space {} for user {} at {}", id.name, id.user, self.store.space_dir(id).display());

        let manifest = descriptor.render()?;
        self.store.write_space(id, &manifest, descriptor.pubkey.as_deref())?;

        info!("Starting space {}", id);
        let output = self.run_compose(id, ComposeAction::Up).await?;
        info!("Successfully started {}", id);

        match self.inspect(id, false).await {
            Ok(instance) => Ok(CreatedSpace { instance, output }),
            Err(e) => {
                error!("Space {} did not resolve after bring-up: {}", id, e);
                Err(SpaceError::ProcessFailure {
                    identity: id.clone(),
                    command: ComposeAction::Up.to_string(),
                    reason: format!("space did not come up: {}", e),
                    output,
                })
            }
        }
    }
}

fn record<T>(operation: &'static str, result: &Result<T, SpaceError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!("devspace_operations_total", "operation" => operation, "outcome" => outcome).increment(1);
}

fn is_stopped(status: &str) -> bool {
    matches!(status, STATUS_EXITED | STATUS_STOPPED | STATUS_CREATED)
}

#[async_trait]
impl SpaceLifecycleService for StandardSpaceManager {
    async fn create(&self, request: SpaceRequest) -> Result<CreatedSpace, SpaceError> {
        let result: Result<CreatedSpace, SpaceError> = async {
            validate_user(&request.user).map_err(SpaceError::InvalidIdentity)?;

            if request.name.is_empty() {
                let _user_guard = self.lock_user(&request.user).await;
                let pool: Vec<&str> = self.settings.name_pool.iter().map(String::as_str).collect();
                let name = self
                    .store
                    .pick_name(&request.user, &pool)
                    .ok_or_else(|| SpaceError::NoNameAvailable(request.user.clone()))?;

                let id = Self::identity(&request.user, &name)?;
                let _guard = self.lock_space(&id).await;
                self.create_locked(&id, &request).await
            } else {
                let id = Self::identity(&request.user, &request.name)?;
                let _guard = self.lock_space(&id).await;
                self.create_locked(&id, &request).await
            }
        }
        .await;

        record("create", &result);
        result
    }

    async fn get(&self, user: &str, name: &str, include_stats: bool) -> Result<InstanceStatus, SpaceError> {
        let id = Self::identity(user, name)?;
        self.inspect(&id, include_stats).await
    }

    async fn list(&self, user: &str) -> Result<Vec<InstanceStatus>, SpaceError> {
        validate_user(user).map_err(SpaceError::InvalidIdentity)?;

        let mut instances = Vec::new();
        for name in self.store.list_space_dirs(user)? {
            match self.get(user, &name, false).await {
                Ok(instance) => instances.push(instance),
                Err(SpaceError::NotFound(_)) => continue,
                Err(e) => warn!("Error getting instance {}.{}: {}", user, name, e),
            }
        }
        Ok(instances)
    }

    async fn stop(&self, user: &str, name: &str) -> Result<(), SpaceError> {
        let id = Self::identity(user, name)?;
        let result: Result<(), SpaceError> = async {
            let _guard = self.lock_space(&id).await;
            let instance = self.inspect(&id, false).await?;

            match instance.status.as_str() {
                STATUS_RUNNING => {
                    info!("Stopping space {}", id);
                    self.run_compose(&id, ComposeAction::Stop).await.map(|_| ())
                }
                status if is_stopped(status) => {
                    info!("Space {} already {}", id, status);
                    Ok(())
                }
                status => Err(SpaceError::InvalidState {
                    identity: id.clone(),
                    operation: "stop",
                    status: status.to_string(),
                }),
            }
        }
        .await;

        record("stop", &result);
        result
    }

    async fn start(&self, user: &str, name: &str) -> Result<(), SpaceError> {
        let id = Self::identity(user, name)?;
        let result: Result<(), SpaceError> = async {
            let _guard = self.lock_space(&id).await;

            match self.inspect(&id, false).await {
                Ok(instance) if instance.is_running() => {
                    info!("Space {} already running", id);
                    Ok(())
                }
                Ok(instance) if is_stopped(&instance.status) => {
                    info!("Starting space {}", id);
                    self.run_compose(&id, ComposeAction::Up).await.map(|_| ())
                }
                Ok(instance) => Err(SpaceError::InvalidState {
                    identity: id.clone(),
                    operation: "start",
                    status: instance.status,
                }),
                // Containers were removed out from under the manifest; bring-up recreates them.
                Err(SpaceError::Inconsistent { detail, .. }) => {
                    warn!("Recreating containers for {}: {}", id, detail);
                    self.run_compose(&id, ComposeAction::Up).await.map(|_| ())
                }
                Err(e) => Err(e),
            }
        }
        .await;

        record("start", &result);
        result
    }

    async fn restart(&self, user: &str, name: &str) -> Result<(), SpaceError> {
        let id = Self::identity(user, name)?;
        let result: Result<(), SpaceError> = async {
            let _guard = self.lock_space(&id).await;
            let instance = self.inspect(&id, false).await?;

            if !instance.is_running() {
                return Err(SpaceError::InvalidState {
                    identity: id.clone(),
                    operation: "restart",
                    status: instance.status,
                });
            }

            info!("Restarting space {}", id);
            self.run_compose(&id, ComposeAction::Down).await?;
            self.run_compose(&id, ComposeAction::Up).await?;
            Ok(())
        }
        .await;

        record("restart", &result);
        result
    }

    async fn kill(&self, user: &str, name: &str) -> Result<(), SpaceError> {
        let id = Self::identity(user, name)?;
        let result: Result<(), SpaceError> = async {
            let _guard = self.lock_space(&id).await;

            if !self.store.manifest_exists(&id) {
                return Err(SpaceError::NotFound(id.clone()));
            }

            info!("Tearing down space {}", id);
            self.run_compose(&id, ComposeAction::Down).await?;
            self.store.remove_space(&id)?;
            info!("Removed space {}", id);
            Ok(())
        }
        .await;

        if result.is_ok() {
            self.forget_lock(&id);
        }
        record("kill", &result);
        result
    }
}
