// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # devspace host daemon
//!
//! The `devspace` binary serves the space lifecycle API for one Docker host.
//!
//! ## Commands
//!
//! - `devspace` / `devspace serve` - Run the HTTP API (default)
//! - `devspace config show|validate` - Inspect the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod daemon;

use commands::ConfigCommand;

/// devspace - per-user development spaces on a Docker host
#[derive(Parser)]
#[command(name = "devspace")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DEVSPACE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port (default: from configuration, 3001)
    #[arg(long, global = true, env = "DEVSPACE_PORT")]
    port: Option<u16>,

    /// HTTP API host
    #[arg(long, global = true, env = "DEVSPACE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DEVSPACE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "DEVSPACE_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Docker socket path (default: local engine defaults)
    #[arg(long, global = true, env = "DEVSPACE_DOCKER_SOCKET", value_name = "PATH")]
    docker_socket: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    #[command(name = "serve")]
    Serve,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Serve) | None => {
            daemon::start_server(daemon::ServerOptions {
                config_path: cli.config,
                host: cli.host,
                port: cli.port,
                metrics_port: cli.metrics_port,
                docker_socket: cli.docker_socket,
            })
            .await
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
