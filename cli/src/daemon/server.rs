// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP server implementation

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use devspace_core::{
    application::{SpaceManagerSettings, StandardSpaceManager},
    domain::host_config::HostConfig,
    infrastructure::{
        compose::ComposeCli, ports::EphemeralPorts, runtime::DockerEngine, space_store::SpaceStore,
        tcp_probe::TcpReachability,
    },
    presentation::api,
};

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub config_path: Option<PathBuf>,
    pub host: String,
    /// Overrides the configured port when set.
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub docker_socket: Option<String>,
}

pub async fn start_server(options: ServerOptions) -> Result<()> {
    info!("devspace {} starting (PID: {})", env!("CARGO_PKG_VERSION"), std::process::id());

    let mut config = HostConfig::load(options.config_path).context("Failed to load configuration")?;
    if let Some(port) = options.port {
        config.port = port;
    }
    config.validate().context("Configuration validation failed")?;

    let spaces_dir = config.spaces_dir();
    std::fs::create_dir_all(&spaces_dir)
        .with_context(|| format!("Failed to create storage directory {:?}", spaces_dir))?;

    info!(
        "Configuration loaded: dir={:?} default_image={} compose={:?}",
        config.dir, config.default_image, config.compose_command
    );

    if let Some(metrics_port) = options.metrics_port {
        let addr: SocketAddr = format!("{}:{}", options.host, metrics_port)
            .parse()
            .with_context(|| format!("Invalid metrics address {}:{}", options.host, metrics_port))?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics listening on {}", addr);
    }

    // The client connects lazily; an unreachable engine at startup is not fatal.
    let engine = Arc::new(DockerEngine::new(options.docker_socket));
    if let Err(e) = engine.healthcheck().await {
        warn!("Container engine not reachable yet: {}", e);
    }

    let manager = StandardSpaceManager::new(
        SpaceStore::new(spaces_dir),
        engine,
        Arc::new(ComposeCli::new(&config.compose_command, config.command_timeout())),
        Arc::new(TcpReachability::new(config.probe_timeout())),
        Arc::new(EphemeralPorts),
        SpaceManagerSettings::from_config(&config),
    );

    let app = api::app(Arc::new(manager));

    let addr = format!("{}:{}", options.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
