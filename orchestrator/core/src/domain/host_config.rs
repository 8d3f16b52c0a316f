// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Host Configuration
//
// Process-wide policy for the space host, loaded once at start:
// - Listen port and storage directory
// - Default workspace image
// - DNS policy injected into every sidecar (nameservers, search, host copy)
// - Compose CLI and in-container probe commands, with their timeouts
//
// Precedence: defaults -> docker-env.yaml -> environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::manifest::{trim_config_value, DnsPolicy};

pub const CONFIG_FILE_NAME: &str = "docker-env.yaml";
pub const DEFAULT_IMAGE_NAME: &str = "docker-env-base:local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base storage directory; spaces live under `{dir}/spaces`
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Image used when a create request does not name one
    #[serde(default = "default_image")]
    pub default_image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_nameservers: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_search: String,

    /// Mount the host resolv.conf into the sidecar instead of passing
    /// explicit DNS arguments
    #[serde(default)]
    pub dns_copy_from_host: bool,

    /// Orchestration CLI, e.g. `["docker-compose"]` or `["docker", "compose"]`
    #[serde(default = "default_compose_command")]
    pub compose_command: Vec<String>,

    /// Helper run inside the workspace to report listening ports
    #[serde(default = "default_probe_command")]
    pub probe_command: Vec<String>,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Bound on one run of the in-container probe helper.
    #[serde(default = "default_probe_exec_timeout_secs")]
    pub probe_exec_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            dir: default_dir(),
            default_image: default_image(),
            dns_nameservers: vec![],
            dns_search: String::new(),
            dns_copy_from_host: false,
            compose_command: default_compose_command(),
            probe_command: default_probe_command(),
            command_timeout_secs: default_command_timeout_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_exec_timeout_secs: default_probe_exec_timeout_secs(),
        }
    }
}

impl HostConfig {
    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Discover the configuration file
    /// 1. DEVSPACE_CONFIG_PATH environment variable
    /// 2. ./docker-env.yaml (working directory)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DEVSPACE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from(".").join(CONFIG_FILE_NAME);
        if cwd.exists() {
            return Some(cwd);
        }

        None
    }

    /// Load with discovery, falling back to defaults, then apply process
    /// environment overrides and sanitize.
    pub fn load(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else {
            tracing::info!("No {} found, using defaults", CONFIG_FILE_NAME);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config.sanitize())
    }

    /// Apply `PORT`, `DIR`, `DEFAULT_IMAGE`, `DNS_SEARCH`, `COPY_HOST_DNS`
    /// and `DNS_NAMESERVERS` from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(port) = set("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT '{}': {}", port, e))?;
        }
        if let Some(dir) = set("DIR") {
            self.dir = PathBuf::from(dir);
        }
        if let Some(image) = set("DEFAULT_IMAGE") {
            self.default_image = image;
        }
        if let Some(search) = set("DNS_SEARCH") {
            tracing::info!("Using custom DNS search domain: {}", search);
            self.dns_search = search;
        }
        if let Some(copy) = set("COPY_HOST_DNS") {
            self.dns_copy_from_host = matches!(copy.as_str(), "true" | "1");
        }
        if let Some(nameservers) = set("DNS_NAMESERVERS") {
            tracing::info!("Using custom nameservers: {}", nameservers);
            self.dns_nameservers = nameservers.split(',').map(String::from).collect();
        }

        Ok(())
    }

    /// Trim quoting/whitespace artifacts and drop empty nameservers.
    pub fn sanitize(mut self) -> Self {
        let dir = self.dir.to_string_lossy().into_owned();
        self.dir = PathBuf::from(trim_config_value(&dir));
        self.default_image = trim_config_value(&self.default_image).to_string();
        self.dns_search = trim_config_value(&self.dns_search).to_string();
        self.dns_nameservers = self
            .dns_nameservers
            .iter()
            .map(|ns| trim_config_value(ns).to_string())
            .filter(|ns| !ns.is_empty())
            .collect();
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dir.as_os_str().is_empty() {
            anyhow::bail!("dir cannot be empty");
        }
        if self.default_image.is_empty() {
            anyhow::bail!("default_image cannot be empty");
        }
        if self.compose_command.is_empty() {
            anyhow::bail!("compose_command cannot be empty");
        }
        if self.probe_command.is_empty() {
            anyhow::bail!("probe_command cannot be empty");
        }
        if self.dns_copy_from_host && (!self.dns_nameservers.is_empty() || !self.dns_search.is_empty()) {
            tracing::warn!("dns_copy_from_host is set; explicit nameservers and search domain are ignored");
        }
        Ok(())
    }

    /// Root of the per-user space directories.
    pub fn spaces_dir(&self) -> PathBuf {
        self.dir.join("spaces")
    }

    pub fn dns_policy(&self) -> DnsPolicy {
        DnsPolicy {
            nameservers: self.dns_nameservers.clone(),
            search: self.dns_search.clone(),
            copy_from_host: self.dns_copy_from_host,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn probe_exec_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_exec_timeout_secs)
    }
}

fn default_port() -> u16 {
    3001
}

fn default_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docker-env")
}

fn default_image() -> String {
    DEFAULT_IMAGE_NAME.to_string()
}

fn default_compose_command() -> Vec<String> {
    vec!["docker-compose".to_string()]
}

fn default_probe_command() -> Vec<String> {
    vec!["/usr/local/bin/open-ports".to_string()]
}

fn default_command_timeout_secs() -> u64 {
    300
}

fn default_probe_timeout_ms() -> u64 {
    100
}

fn default_probe_exec_timeout_secs() -> u64 {
    5
}
