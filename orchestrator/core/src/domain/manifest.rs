// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compose Manifest Model
//!
//! A space is described by a two-service compose file: a privileged
//! Docker-in-Docker sidecar (`docker`) and the user workspace (`workspace`)
//! whose `DOCKER_HOST` points at the sidecar.
//!
//! The manifest is assembled as typed structs and then serialized with
//! `serde_yaml`, so optional fragments (DNS arguments, credentials) are either
//! present as whole fields or absent. Rendering is a pure function of the
//! [`SpaceDescriptor`].

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::space::{SpaceIdentity, SSH_CONTAINER_PORT};

pub const MANIFEST_FILE: &str = "docker-compose.yml";
pub const PUBKEY_FILE: &str = "pubkey";

pub const SIDECAR_SERVICE: &str = "docker";
pub const WORKSPACE_SERVICE: &str = "workspace";
pub const SIDECAR_IMAGE: &str = "docker:dind";
pub const HOST_RESOLV_CONF: &str = "/etc/resolv.conf";

const RESTART_POLICY: &str = "unless-stopped";
const SIDECAR_DOCKER_HOST: &str = "tcp://docker:2375";

/// Auxiliary services every workspace image listens on.
pub const VSCODE_CONTAINER_PORT: u16 = 8080;
pub const PROJECTOR_CONTAINER_PORT: u16 = 9999;

/// DNS settings injected into the sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsPolicy {
    pub nameservers: Vec<String>,
    pub search: String,
    pub copy_from_host: bool,
}

impl DnsPolicy {
    /// Daemon arguments for the sidecar, e.g.
    /// `--dns 1.2.3.4 --dns 8.8.8.8 --dns-search search.com`.
    ///
    /// Empty when nothing is configured.
    pub fn docker_args(&self) -> String {
        let mut args: Vec<String> = self
            .nameservers
            .iter()
            .map(|ns| trim_config_value(ns))
            .filter(|ns| !ns.is_empty())
            .map(|ns| format!("--dns {}", ns))
            .collect();

        let search = trim_config_value(&self.search);
        if !search.is_empty() {
            args.push(format!("--dns-search {}", search));
        }

        args.join(" ")
    }
}

/// Strip quoting and whitespace artifacts left by env vars and YAML.
pub fn trim_config_value(value: &str) -> &str {
    value.trim_matches(|c| matches!(c, '"' | '\'' | ' ' | '\t'))
}

/// Fully resolved parameters for one manifest render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceDescriptor {
    pub identity: SpaceIdentity,
    pub image: String,
    pub password: String,
    pub pubkey: Option<String>,
    /// Host ports; `0` lets the engine pick an ephemeral one.
    pub ssh_port: u16,
    pub vscode_port: u16,
    pub projector_port: u16,
    /// Storage root; the sidecar image cache lives beneath it.
    pub root: PathBuf,
    pub dns: DnsPolicy,
}

impl SpaceDescriptor {
    /// URL-safe base64 of the public key, as the workspace image expects it.
    pub fn pubkey_encoded(&self) -> Option<String> {
        self.pubkey
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(|key| URL_SAFE.encode(key.as_bytes()))
    }

    pub fn to_compose(&self) -> ComposeFile {
        let id = &self.identity;

        let mut sidecar_volumes = vec![format!(
            "{}:/var/lib/docker/overlay2",
            self.root.join("image-cache").display()
        )];

        let command = if self.dns.copy_from_host {
            sidecar_volumes.push(format!("{0}:{0}:ro", HOST_RESOLV_CONF));
            None
        } else {
            Some(self.dns.docker_args()).filter(|args| !args.is_empty())
        };

        let sidecar = ServiceSpec {
            image: Some(SIDECAR_IMAGE.to_string()),
            restart: RESTART_POLICY.to_string(),
            container_name: id.sidecar_container(),
            hostname: None,
            privileged: Some(true),
            expose: vec![2375, 2376],
            ports: vec![],
            depends_on: vec![],
            environment: BTreeMap::from([("DOCKER_TLS_CERTDIR".to_string(), String::new())]),
            volumes: sidecar_volumes,
            command,
        };

        let mut environment = BTreeMap::from([
            ("DOCKER_HOST".to_string(), SIDECAR_DOCKER_HOST.to_string()),
            ("ENV_USER".to_string(), id.user.clone()),
            ("ENV_USER_PASSWORD".to_string(), self.password.clone()),
        ]);
        if let Some(encoded) = self.pubkey_encoded() {
            environment.insert("PUBKEY".to_string(), encoded);
        }

        let image = Some(self.image.clone()).filter(|image| !image.is_empty());

        let workspace = ServiceSpec {
            image,
            restart: RESTART_POLICY.to_string(),
            container_name: id.workspace_container(),
            hostname: Some(id.hostname()),
            privileged: None,
            expose: vec![],
            ports: vec![
                format!("{}:{}", self.ssh_port, SSH_CONTAINER_PORT),
                format!("{}:{}", self.vscode_port, VSCODE_CONTAINER_PORT),
                format!("{}:{}", self.projector_port, PROJECTOR_CONTAINER_PORT),
            ],
            depends_on: vec![SIDECAR_SERVICE.to_string()],
            environment,
            volumes: vec![format!("{}:/home/{}", id.home_volume(), id.user)],
            command: None,
        };

        ComposeFile {
            version: "3".to_string(),
            services: Services {
                docker: sidecar,
                workspace,
            },
            volumes: BTreeMap::from([(id.home_volume(), None)]),
        }
    }

    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_compose())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeFile {
    pub version: String,
    pub services: Services,
    pub volumes: BTreeMap<String, Option<NamedVolume>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Services {
    pub docker: ServiceSpec,
    pub workspace: ServiceSpec,
}

/// Named volumes take the engine's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedVolume {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub restart: String,
    pub container_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expose: Vec<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}
