// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::runtime::{ContainerEngine, ContainerSnapshot, EngineError, ExecOutput, PortBinding};
use crate::domain::space::{ContainerStats, CpuStats, MemoryStats};
use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, LogOutput, Stats, StatsOptions};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Docker engine adapter.
///
/// The client is created lazily on first use and shared afterwards. A failed
/// connection attempt is not cached, so the next call tries again.
pub struct DockerEngine {
    socket_path: Option<String>,
    client: Mutex<Option<Docker>>,
}

impl DockerEngine {
    pub fn new(socket_path: Option<String>) -> Self {
        Self {
            socket_path,
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<Docker, EngineError> {
        let mut guard = self.client.lock();
        if let Some(docker) = guard.as_ref() {
            return Ok(docker.clone());
        }

        let docker = match &self.socket_path {
            #[cfg(unix)]
            Some(path) => Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION),
            #[cfg(windows)]
            Some(path) => Docker::connect_with_named_pipe(path, 120, bollard::API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| {
            warn!("Error getting docker client: {}", e);
            EngineError::Connection(e.to_string())
        })?;

        *guard = Some(docker.clone());
        Ok(docker)
    }

    /// Verify the Docker daemon is reachable
    pub async fn healthcheck(&self) -> Result<(), EngineError> {
        self.client()?
            .ping()
            .await
            .map_err(|e| EngineError::Connection(format!("Cannot connect to Docker daemon: {}", e)))?;
        Ok(())
    }
}

fn map_error(what: &str, e: BollardError) -> EngineError {
    match e {
        BollardError::DockerResponseServerError { status_code: 404, message } => {
            EngineError::NotFound(format!("{}: {}", what, message))
        }
        other => EngineError::Query(format!("{}: {}", what, other)),
    }
}

fn convert_stats(stats: &Stats) -> ContainerStats {
    let memory = &stats.memory_stats;
    let cpu = &stats.cpu_stats;
    ContainerStats {
        memory_stats: MemoryStats {
            usage: memory.usage.unwrap_or(0),
            max_usage: memory.max_usage.unwrap_or(0),
            limit: memory.limit.unwrap_or(0),
        },
        cpu_stats: CpuStats {
            total_usage: cpu.cpu_usage.total_usage,
            usage_in_kernelmode: cpu.cpu_usage.usage_in_kernelmode,
            usage_in_usermode: cpu.cpu_usage.usage_in_usermode,
            system_cpu_usage: cpu.system_cpu_usage.unwrap_or(0),
            online_cpus: cpu.online_cpus.unwrap_or(0),
        },
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn inspect_image(&self, image: &str) -> Result<(), EngineError> {
        self.client()?
            .inspect_image(image)
            .await
            .map_err(|e| map_error(image, e))?;
        Ok(())
    }

    async fn inspect_container(&self, container: &str) -> Result<ContainerSnapshot, EngineError> {
        let inspect = self
            .client()?
            .inspect_container(container, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_error(container, e))?;

        let status = inspect
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_default();

        let network = inspect.network_settings.unwrap_or_default();

        let ports = network
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(|(spec, bindings)| {
                let bindings = bindings
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| PortBinding {
                        host_ip: b.host_ip,
                        host_port: b.host_port.unwrap_or_default(),
                    })
                    .collect();
                (spec, bindings)
            })
            .collect::<HashMap<_, _>>();

        let gateway = network
            .networks
            .unwrap_or_default()
            .into_values()
            .filter_map(|n| n.gateway)
            .find(|g| !g.is_empty());

        Ok(ContainerSnapshot { status, ports, gateway })
    }

    async fn stats(&self, container: &str) -> Result<ContainerStats, EngineError> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };

        let docker = self.client()?;
        let mut stream = Box::pin(docker.stats(container, Some(options)));
        match stream.next().await {
            Some(Ok(stats)) => Ok(convert_stats(&stats)),
            Some(Err(e)) => Err(map_error(container, e)),
            None => Err(EngineError::Query(format!("{}: empty stats response", container))),
        }
    }

    async fn exec(&self, container: &str, cmd: &[String]) -> Result<ExecOutput, EngineError> {
        let docker = self.client()?;

        let exec_config = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(cmd.to_vec()),
            ..Default::default()
        };

        let exec = docker
            .create_exec(container, exec_config)
            .await
            .map_err(|e| map_error(container, e))?;

        let res = docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| map_error(container, e))?;

        let mut output = String::new();
        if let StartExecResults::Attached { output: mut stream, .. } = res {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(LogOutput::StdOut { message })
                    | Ok(LogOutput::StdErr { message })
                    | Ok(LogOutput::Console { message }) => {
                        output.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdIn { .. }) => {}
                    Err(e) => return Err(map_error(container, e)),
                }
            }
        }

        let exec_inspect = docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| map_error(container, e))?;

        debug!(container, exit_code = ?exec_inspect.exit_code, "exec finished");

        Ok(ExecOutput {
            exit_code: exec_inspect.exit_code,
            output,
        })
    }
}
