// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use devspace_core::application::{SpaceLifecycleService, SpaceManagerSettings, StandardSpaceManager};
use devspace_core::domain::error::SpaceError;
use devspace_core::domain::manifest::DnsPolicy;
use devspace_core::domain::runtime::{
    ComposeAction, ComposeInvoker, ContainerEngine, ContainerSnapshot, EngineError, ExecOutput, InvocationOutput,
    InvokerError, PortBinding, ReachabilityCheck,
};
use devspace_core::domain::space::{ContainerStats, MemoryStats, SpaceRequest};
use devspace_core::infrastructure::ports::HostPortSource;
use devspace_core::infrastructure::space_store::SpaceStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const IMAGE: &str = "docker-env-base:local";

// ============================================================================
// Fakes
// ============================================================================

struct FakeEngine {
    images: Mutex<HashSet<String>>,
    containers: Mutex<HashMap<String, ContainerSnapshot>>,
    /// Result of running the probe helper; `Err` simulates an exec failure.
    probe: Mutex<Result<ExecOutput, String>>,
    probe_delay: Mutex<Option<Duration>>,
    stats_calls: Mutex<usize>,
}

impl FakeEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            images: Mutex::new(HashSet::from([IMAGE.to_string()])),
            containers: Mutex::new(HashMap::new()),
            probe: Mutex::new(Ok(ExecOutput {
                exit_code: Some(0),
                output: String::new(),
            })),
            probe_delay: Mutex::new(None),
            stats_calls: Mutex::new(0),
        })
    }

    fn set_status(&self, container: &str, status: &str) {
        let mut containers = self.containers.lock();
        let snapshot = containers.entry(container.to_string()).or_insert_with(|| ContainerSnapshot {
            status: String::new(),
            ports: HashMap::from([
                ("22/tcp".to_string(), vec![binding("40022")]),
                ("8080/tcp".to_string(), vec![binding("48080")]),
                ("9999/tcp".to_string(), vec![binding("49999")]),
            ]),
            gateway: Some("172.17.0.1".to_string()),
        });
        snapshot.status = status.to_string();
    }

    fn remove(&self, container: &str) {
        self.containers.lock().remove(container);
    }

    fn status(&self, container: &str) -> Option<String> {
        self.containers.lock().get(container).map(|c| c.status.clone())
    }

    fn set_probe(&self, result: Result<ExecOutput, String>) {
        *self.probe.lock() = result;
    }

    fn hang_exec(&self, delay: Duration) {
        *self.probe_delay.lock() = Some(delay);
    }
}

fn binding(port: &str) -> PortBinding {
    PortBinding {
        host_ip: Some("0.0.0.0".to_string()),
        host_port: port.to_string(),
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn inspect_image(&self, image: &str) -> Result<(), EngineError> {
        if self.images.lock().contains(image) {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("no such image: {}", image)))
        }
    }

    async fn inspect_container(&self, container: &str) -> Result<ContainerSnapshot, EngineError> {
        self.containers
            .lock()
            .get(container)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("no such container: {}", container)))
    }

    async fn stats(&self, _container: &str) -> Result<ContainerStats, EngineError> {
        *self.stats_calls.lock() += 1;
        Ok(ContainerStats {
            memory_stats: MemoryStats {
                usage: 1024,
                max_usage: 2048,
                limit: 4096,
            },
            ..Default::default()
        })
    }

    async fn exec(&self, _container: &str, _cmd: &[String]) -> Result<ExecOutput, EngineError> {
        let delay = *self.probe_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.probe.lock().clone().map_err(EngineError::Query)
    }
}

/// Records every compose call and mirrors its effect on the fake engine.
struct FakeInvoker {
    engine: Arc<FakeEngine>,
    calls: Mutex<Vec<(String, PathBuf, ComposeAction)>>,
    fail_on: Mutex<Option<ComposeAction>>,
    /// `up` succeeds but leaves no container behind.
    up_without_containers: Mutex<bool>,
}

impl FakeInvoker {
    fn new(engine: Arc<FakeEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            calls: Mutex::new(vec![]),
            fail_on: Mutex::new(None),
            up_without_containers: Mutex::new(false),
        })
    }

    fn actions(&self) -> Vec<ComposeAction> {
        self.calls.lock().iter().map(|(_, _, action)| *action).collect()
    }

    fn projects(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(project, _, _)| project.clone()).collect()
    }

    fn fail_on(&self, action: ComposeAction) {
        *self.fail_on.lock() = Some(action);
    }
}

fn container_for(dir: &Path) -> String {
    let name = dir.file_name().unwrap().to_string_lossy();
    let user = dir.parent().unwrap().file_name().unwrap().to_string_lossy();
    format!("space-{}-{}", user, name)
}

#[async_trait]
impl ComposeInvoker for FakeInvoker {
    async fn invoke(
        &self,
        project: &str,
        dir: &Path,
        action: ComposeAction,
    ) -> Result<InvocationOutput, InvokerError> {
        self.calls.lock().push((project.to_string(), dir.to_path_buf(), action));

        if *self.fail_on.lock() == Some(action) {
            return Ok(InvocationOutput {
                exit_code: Some(1),
                output: format!("ERROR: {} exploded", action),
            });
        }

        let container = container_for(dir);
        match action {
            ComposeAction::Up if *self.up_without_containers.lock() => {}
            ComposeAction::Up => self.engine.set_status(&container, "running"),
            ComposeAction::Stop => self.engine.set_status(&container, "exited"),
            ComposeAction::Down => self.engine.remove(&container),
        }

        Ok(InvocationOutput {
            exit_code: Some(0),
            output: format!("{} done", action),
        })
    }
}

struct FakeReachability {
    open: HashSet<u16>,
}

#[async_trait]
impl ReachabilityCheck for FakeReachability {
    async fn is_open(&self, _host: &str, port: u16) -> bool {
        self.open.contains(&port)
    }
}

struct SequentialPorts(AtomicU16);

impl HostPortSource for SequentialPorts {
    fn free_port(&self) -> io::Result<u16> {
        Ok(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

struct Harness {
    _tmp: TempDir,
    root: PathBuf,
    engine: Arc<FakeEngine>,
    invoker: Arc<FakeInvoker>,
    manager: StandardSpaceManager,
}

fn harness() -> Harness {
    harness_with_dns(DnsPolicy::default())
}

fn harness_with_dns(dns: DnsPolicy) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("spaces");
    let engine = FakeEngine::new();
    let invoker = FakeInvoker::new(engine.clone());

    let settings = SpaceManagerSettings {
        default_image: IMAGE.to_string(),
        dns,
        storage_root: tmp.path().to_path_buf(),
        probe_command: vec!["/usr/local/bin/open-ports".to_string()],
        probe_exec_timeout: Duration::from_millis(200),
        name_pool: vec!["grover".into(), "elmo".into(), "bert".into()],
    };

    let manager = StandardSpaceManager::new(
        SpaceStore::new(&root),
        engine.clone(),
        invoker.clone(),
        Arc::new(FakeReachability {
            open: HashSet::from([48080]),
        }),
        Arc::new(SequentialPorts(AtomicU16::new(40000))),
        settings,
    );

    Harness {
        _tmp: tmp,
        root,
        engine,
        invoker,
        manager,
    }
}

/// Mark `name` as taken the way the manager does: a directory with a manifest.
fn occupy(root: &Path, user: &str, name: &str) {
    let dir = root.join(user).join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("docker-compose.yml"), "version: '3'\n").unwrap();
}

fn read_manifest(root: &Path, user: &str, name: &str) -> String {
    std::fs::read_to_string(root.join(user).join(name).join("docker-compose.yml")).unwrap()
}

// ============================================================================
// Get / List
// ============================================================================

#[tokio::test]
async fn test_get_without_manifest_is_not_found() {
    let h = harness();
    let err = h.manager.get("alice", "elmo", false).await.unwrap_err();
    assert!(matches!(err, SpaceError::NotFound(_)));
}

#[tokio::test]
async fn test_get_with_manifest_but_no_container_is_inconsistent() {
    let h = harness();
    std::fs::create_dir_all(h.root.join("alice/elmo")).unwrap();
    std::fs::write(h.root.join("alice/elmo/docker-compose.yml"), "version: '3'\n").unwrap();

    let err = h.manager.get("alice", "elmo", false).await.unwrap_err();
    assert!(matches!(err, SpaceError::Inconsistent { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_get_rejects_path_traversal() {
    let h = harness();
    let err = h.manager.get("..", "elmo", false).await.unwrap_err();
    assert!(matches!(err, SpaceError::InvalidIdentity(_)));
}

#[tokio::test]
async fn test_list_unknown_user_is_empty() {
    let h = harness();
    assert!(h.manager.list("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_skips_dirs_without_manifest_and_unresolvable_spaces() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    std::fs::create_dir_all(h.root.join("alice/half-made")).unwrap();
    h.engine.remove("space-alice-elmo");
    h.manager.create(SpaceRequest::new("alice").with_name("bert")).await.unwrap();

    let names: Vec<String> = h.manager.list("alice").await.unwrap().into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["bert"]);
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let h = harness();
    let created = h
        .manager
        .create(SpaceRequest::new("alice").with_name("elmo").with_pubkey("ssh-ed25519 AAAA"))
        .await
        .unwrap();

    assert_eq!(created.instance.name, "elmo");
    assert_eq!(created.instance.status, "running");
    assert_eq!(created.instance.ssh_port, 40022);
    assert_eq!(created.output, "up -d done");
    assert!(h.root.join("alice/elmo/docker-compose.yml").is_file());
    assert_eq!(
        std::fs::read_to_string(h.root.join("alice/elmo/pubkey")).unwrap(),
        "ssh-ed25519 AAAA"
    );

    let got = h.manager.get("alice", "elmo", false).await.unwrap();
    assert_eq!(got.user, "alice");
    assert_eq!(got.name, "elmo");
    assert!(got.container_stats.is_none());
}

#[tokio::test]
async fn test_create_allocates_first_free_name() {
    let h = harness();
    occupy(&h.root, "alice", "grover");
    occupy(&h.root, "alice", "elmo");

    let created = h.manager.create(SpaceRequest::new("alice")).await.unwrap();
    assert_eq!(created.instance.name, "bert");
    assert_eq!(h.invoker.projects(), vec!["alice-bert"]);
}

#[tokio::test]
async fn test_create_treats_directory_without_manifest_as_free() {
    let h = harness();
    std::fs::create_dir_all(h.root.join("alice/grover")).unwrap();

    let created = h.manager.create(SpaceRequest::new("alice")).await.unwrap();
    assert_eq!(created.instance.name, "grover");
}

#[tokio::test]
async fn test_create_with_exhausted_pool_fails_without_side_effects() {
    let h = harness();
    for name in ["grover", "elmo", "bert"] {
        occupy(&h.root, "alice", name);
    }

    let err = h.manager.create(SpaceRequest::new("alice")).await.unwrap_err();
    assert!(matches!(err, SpaceError::NoNameAvailable(ref user) if user == "alice"));
    assert!(h.invoker.actions().is_empty());
}

#[tokio::test]
async fn test_create_existing_space_returns_its_status() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();

    let err = h
        .manager
        .create(SpaceRequest::new("alice").with_name("elmo"))
        .await
        .unwrap_err();

    match err {
        SpaceError::AlreadyExists(instance) => {
            assert_eq!(instance.name, "elmo");
            assert_eq!(instance.status, "running");
        }
        other => panic!("expected AlreadyExists, got {:?}", other),
    }
    assert_eq!(h.invoker.actions(), vec![ComposeAction::Up]);
}

#[tokio::test]
async fn test_create_with_unknown_image_writes_nothing() {
    let h = harness();
    let err = h
        .manager
        .create(SpaceRequest::new("alice").with_name("elmo").with_image("nope:latest"))
        .await
        .unwrap_err();

    assert!(matches!(err, SpaceError::ImageNotFound(ref image) if image == "nope:latest"));
    assert!(!h.root.join("alice/elmo").exists());
    assert!(h.invoker.actions().is_empty());
}

#[tokio::test]
async fn test_create_bring_up_failure_carries_output() {
    let h = harness();
    h.invoker.fail_on(ComposeAction::Up);

    let err = h
        .manager
        .create(SpaceRequest::new("alice").with_name("elmo"))
        .await
        .unwrap_err();

    assert!(matches!(err, SpaceError::ProcessFailure { .. }));
    assert_eq!(err.output(), Some("ERROR: up -d exploded"));
    // The manifest stays behind so the operator can inspect it.
    assert!(h.root.join("alice/elmo/docker-compose.yml").is_file());
}

#[tokio::test]
async fn test_create_reprovisions_unresolvable_directory() {
    let h = harness();
    std::fs::create_dir_all(h.root.join("alice/elmo")).unwrap();

    let created = h
        .manager
        .create(SpaceRequest::new("alice").with_name("elmo"))
        .await
        .unwrap();
    assert_eq!(created.instance.status, "running");
}

#[tokio::test]
async fn test_create_existing_space_with_failing_port_query_does_not_relaunch() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    let manifest = read_manifest(&h.root, "alice", "elmo");
    h.engine.set_probe(Ok(ExecOutput {
        exit_code: Some(1),
        output: "permission denied".to_string(),
    }));

    let err = h
        .manager
        .create(SpaceRequest::new("alice").with_name("elmo"))
        .await
        .unwrap_err();

    assert!(matches!(err, SpaceError::AlreadyExists(ref instance) if instance.status == "running"));
    assert_eq!(h.invoker.actions(), vec![ComposeAction::Up]);
    assert_eq!(read_manifest(&h.root, "alice", "elmo"), manifest);
}

#[tokio::test]
async fn test_create_with_unreachable_engine_keeps_existing_manifest() {
    struct BrokenEngine;

    #[async_trait]
    impl ContainerEngine for BrokenEngine {
        async fn inspect_image(&self, _image: &str) -> Result<(), EngineError> {
            Ok(())
        }
        async fn inspect_container(&self, _container: &str) -> Result<ContainerSnapshot, EngineError> {
            Err(EngineError::Connection("engine down".to_string()))
        }
        async fn stats(&self, _container: &str) -> Result<ContainerStats, EngineError> {
            Err(EngineError::Connection("engine down".to_string()))
        }
        async fn exec(&self, _container: &str, _cmd: &[String]) -> Result<ExecOutput, EngineError> {
            Err(EngineError::Connection("engine down".to_string()))
        }
    }

    let h = harness();
    occupy(&h.root, "alice", "elmo");
    let manager = StandardSpaceManager::new(
        SpaceStore::new(&h.root),
        Arc::new(BrokenEngine),
        h.invoker.clone(),
        Arc::new(FakeReachability { open: HashSet::new() }),
        Arc::new(SequentialPorts(AtomicU16::new(40000))),
        SpaceManagerSettings {
            default_image: IMAGE.to_string(),
            dns: DnsPolicy::default(),
            storage_root: h.root.clone(),
            probe_command: vec!["/usr/local/bin/open-ports".to_string()],
            probe_exec_timeout: Duration::from_millis(200),
            name_pool: vec!["elmo".into()],
        },
    );

    let err = manager
        .create(SpaceRequest::new("alice").with_name("elmo"))
        .await
        .unwrap_err();

    assert!(matches!(err, SpaceError::EngineQuery(_)));
    assert!(h.invoker.actions().is_empty());
    assert_eq!(read_manifest(&h.root, "alice", "elmo"), "version: '3'\n");
}

#[tokio::test]
async fn test_create_keeps_bring_up_output_when_space_does_not_resolve() {
    let h = harness();
    *h.invoker.up_without_containers.lock() = true;

    let err = h
        .manager
        .create(SpaceRequest::new("alice").with_name("elmo"))
        .await
        .unwrap_err();

    assert!(matches!(err, SpaceError::ProcessFailure { .. }), "got {:?}", err);
    assert_eq!(err.output(), Some("up -d done"));
}

#[tokio::test]
async fn test_created_manifest_carries_identity_and_policy() {
    let h = harness_with_dns(DnsPolicy {
        nameservers: vec!["1.2.3.4".into()],
        search: "corp.local".into(),
        copy_from_host: false,
    });
    h.engine.images.lock().insert("custom:1".to_string());

    let mut request = SpaceRequest::new("alice").with_image("custom:1").with_password("pw");
    request.ssh_port = 2222;
    let created = h.manager.create(request).await.unwrap();
    assert_eq!(created.instance.name, "grover");

    let manifest = read_manifest(&h.root, "alice", "grover");
    assert!(manifest.contains("space-alice-grover"));
    assert!(manifest.contains("dind-alice-grover"));
    assert!(manifest.contains("--dns 1.2.3.4 --dns-search corp.local"));
    assert!(manifest.contains("custom:1"));
    assert!(manifest.contains("2222:22"));
    assert!(!manifest.contains("/etc/resolv.conf"));
}

#[tokio::test]
async fn test_same_name_for_two_users_uses_separate_projects() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("grover")).await.unwrap();
    h.manager.create(SpaceRequest::new("bob").with_name("grover")).await.unwrap();
    h.manager.kill("bob", "grover").await.unwrap();

    assert_eq!(h.invoker.projects(), vec!["alice-grover", "bob-grover", "bob-grover"]);
    assert_eq!(h.manager.get("alice", "grover", false).await.unwrap().status, "running");
}

#[tokio::test]
async fn test_create_rejects_dash_in_user() {
    let h = harness();
    let err = h
        .manager
        .create(SpaceRequest::new("a-b").with_name("c"))
        .await
        .unwrap_err();
    assert!(matches!(err, SpaceError::InvalidIdentity(_)));
    assert!(h.invoker.actions().is_empty());
}

#[tokio::test]
async fn test_concurrent_unnamed_creates_get_distinct_names() {
    let h = harness();
    let (a, b) = tokio::join!(
        h.manager.create(SpaceRequest::new("alice")),
        h.manager.create(SpaceRequest::new("alice"))
    );

    let mut names = vec![a.unwrap().instance.name, b.unwrap().instance.name];
    names.sort();
    assert_eq!(names, vec!["elmo", "grover"]);
}

// ============================================================================
// Stop / Start / Restart / Kill
// ============================================================================

#[tokio::test]
async fn test_stop_then_stop_is_noop() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();

    h.manager.stop("alice", "elmo").await.unwrap();
    assert_eq!(h.engine.status("space-alice-elmo").as_deref(), Some("exited"));

    h.manager.stop("alice", "elmo").await.unwrap();
    assert_eq!(h.invoker.actions(), vec![ComposeAction::Up, ComposeAction::Stop]);
}

#[tokio::test]
async fn test_stop_in_unexpected_state_is_invalid() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.engine.set_status("space-alice-elmo", "paused");

    let err = h.manager.stop("alice", "elmo").await.unwrap_err();
    assert!(matches!(err, SpaceError::InvalidState { operation: "stop", ref status, .. } if status == "paused"));
}

#[tokio::test]
async fn test_start_running_is_noop_and_start_stopped_brings_up() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();

    h.manager.start("alice", "elmo").await.unwrap();
    assert_eq!(h.invoker.actions(), vec![ComposeAction::Up]);

    h.manager.stop("alice", "elmo").await.unwrap();
    h.manager.start("alice", "elmo").await.unwrap();
    assert_eq!(
        h.invoker.actions(),
        vec![ComposeAction::Up, ComposeAction::Stop, ComposeAction::Up]
    );
    assert_eq!(h.engine.status("space-alice-elmo").as_deref(), Some("running"));
}

#[tokio::test]
async fn test_start_recreates_missing_containers() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.engine.remove("space-alice-elmo");

    h.manager.start("alice", "elmo").await.unwrap();
    assert_eq!(h.engine.status("space-alice-elmo").as_deref(), Some("running"));
}

#[tokio::test]
async fn test_restart_requires_running() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.manager.stop("alice", "elmo").await.unwrap();

    let err = h.manager.restart("alice", "elmo").await.unwrap_err();
    assert!(matches!(err, SpaceError::InvalidState { operation: "restart", .. }));
}

#[tokio::test]
async fn test_restart_runs_down_then_up() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();

    h.manager.restart("alice", "elmo").await.unwrap();
    assert_eq!(
        h.invoker.actions(),
        vec![ComposeAction::Up, ComposeAction::Down, ComposeAction::Up]
    );
}

#[tokio::test]
async fn test_restart_skips_up_when_down_fails() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.invoker.fail_on(ComposeAction::Down);

    let err = h.manager.restart("alice", "elmo").await.unwrap_err();
    assert!(matches!(err, SpaceError::ProcessFailure { .. }));
    assert_eq!(h.invoker.actions(), vec![ComposeAction::Up, ComposeAction::Down]);
}

#[tokio::test]
async fn test_kill_removes_directory() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();

    h.manager.kill("alice", "elmo").await.unwrap();
    assert!(!h.root.join("alice/elmo").exists());

    let err = h.manager.get("alice", "elmo", false).await.unwrap_err();
    assert!(matches!(err, SpaceError::NotFound(_)));
}

#[tokio::test]
async fn test_kill_keeps_directory_when_teardown_fails() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.invoker.fail_on(ComposeAction::Down);

    let err = h.manager.kill("alice", "elmo").await.unwrap_err();
    assert_eq!(err.output(), Some("ERROR: down exploded"));
    assert!(h.root.join("alice/elmo/docker-compose.yml").is_file());
}

#[tokio::test]
async fn test_kill_unknown_space_is_not_found() {
    let h = harness();
    let err = h.manager.kill("alice", "elmo").await.unwrap_err();
    assert!(matches!(err, SpaceError::NotFound(_)));
    assert!(h.invoker.actions().is_empty());
}

// ============================================================================
// Port probing and stats
// ============================================================================

#[tokio::test]
async fn test_probed_ports_report_direct_and_tunnelled_services() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.engine.set_probe(Ok(ExecOutput {
        exit_code: Some(0),
        output: "8080=vscode|Open in browser\n3000=webapp\n".to_string(),
    }));

    let instance = h.manager.get("alice", "elmo", true).await.unwrap();

    assert_eq!(instance.ports.len(), 2);
    let vscode = &instance.ports[0];
    assert_eq!((vscode.label.as_str(), vscode.port, vscode.remote_port), ("vscode", 48080, 8080));
    assert_eq!(vscode.message, "Open in browser");

    let webapp = &instance.ports[1];
    assert_eq!((webapp.label.as_str(), webapp.port, webapp.remote_port), ("webapp", 0, 3000));

    assert_eq!(instance.container_stats.unwrap().memory_stats.usage, 1024);
}

#[tokio::test]
async fn test_missing_probe_binary_yields_no_ports() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.engine.set_probe(Ok(ExecOutput {
        exit_code: Some(126),
        output: "OCI runtime exec failed: exec: \"/usr/local/bin/open-ports\": stat /usr/local/bin/open-ports: no such file or directory".to_string(),
    }));

    let instance = h.manager.get("alice", "elmo", false).await.unwrap();
    assert!(instance.ports.is_empty());
}

#[tokio::test]
async fn test_probe_failure_is_engine_query_error() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.engine.set_probe(Err("connection reset".to_string()));

    let err = h.manager.get("alice", "elmo", false).await.unwrap_err();
    assert!(matches!(err, SpaceError::EngineQuery(_)));
}

#[tokio::test]
async fn test_hung_port_query_is_bounded() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.engine.hang_exec(Duration::from_secs(30));

    let started = std::time::Instant::now();
    let err = h.manager.get("alice", "elmo", false).await.unwrap_err();

    assert!(matches!(err, SpaceError::EngineQuery(ref msg) if msg.contains("timed out")));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_stopped_space_skips_probe_and_stats() {
    let h = harness();
    h.manager.create(SpaceRequest::new("alice").with_name("elmo")).await.unwrap();
    h.manager.stop("alice", "elmo").await.unwrap();
    h.engine.set_probe(Err("must not be called".to_string()));

    let instance = h.manager.get("alice", "elmo", true).await.unwrap();
    assert_eq!(instance.status, "exited");
    assert!(instance.ports.is_empty());
    assert!(instance.container_stats.is_none());
    assert_eq!(*h.engine.stats_calls.lock(), 0);
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle() {
    let h = harness();

    let created = h.manager.create(SpaceRequest::new("alice")).await.unwrap();
    assert_eq!(created.instance.name, "grover");

    let listed = h.manager.list("alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, "running");

    h.manager.stop("alice", "grover").await.unwrap();
    assert_eq!(h.manager.get("alice", "grover", false).await.unwrap().status, "exited");

    h.manager.start("alice", "grover").await.unwrap();
    h.manager.restart("alice", "grover").await.unwrap();
    h.manager.kill("alice", "grover").await.unwrap();

    assert!(h.manager.list("alice").await.unwrap().is_empty());
    assert_eq!(
        h.invoker.actions(),
        vec![
            ComposeAction::Up,
            ComposeAction::Stop,
            ComposeAction::Up,
            ComposeAction::Down,
            ComposeAction::Up,
            ComposeAction::Down,
        ]
    );
}
