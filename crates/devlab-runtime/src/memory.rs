//! In-memory container engine
//!
//! Behaves like a well-mannered Docker daemon without touching the host.
//! Tests drive it into awkward corners through the fault-injection helpers:
//! an unreachable engine, one-shot operation failures, containers that
//! vanish or exit behind the manager's back, and orphans nobody recorded.

use crate::catalog::ImageCatalog;
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::ports::PortAllocator;
use crate::runtime::ContainerRuntime;
use crate::types::{
    ContainerInfo, HostAddress, LiveStatus, ProvisionRequest, Provisioned, MANAGED_LABEL,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Operation selector for injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeOp {
    /// `create_and_start`
    Create,
    /// `status`
    Status,
    /// `exists`
    Exists,
    /// `terminal_address`
    TerminalAddress,
    /// `stop`
    Stop,
    /// `remove`
    Remove,
    /// `exec`
    Exec,
    /// `list`
    List,
}

/// One simulated container
#[derive(Debug, Clone)]
pub struct MemContainer {
    /// Engine ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Resolved image
    pub image: String,
    /// Scenario type requested
    pub scenario_type: String,
    /// Live state
    pub state: LiveStatus,
    /// Host port bound to the shell port
    pub host_port: Option<u16>,
    /// Shell port inside the container
    pub container_port: u16,
    /// Attached labels
    pub labels: HashMap<String, String>,
    /// Startup script as it would be passed to the engine
    pub script: Option<String>,
}

/// In-memory [`ContainerRuntime`]
#[derive(Debug)]
pub struct InMemoryRuntime {
    containers: DashMap<String, MemContainer>,
    ports: PortAllocator,
    catalog: ImageCatalog,
    next_id: AtomicU64,
    unavailable: AtomicBool,
    faults: Mutex<HashMap<RuntimeOp, RuntimeError>>,
    exec_output: Mutex<HashMap<String, String>>,
    latency: Mutex<Option<Duration>>,
    fail_startup: AtomicBool,
    // serialises port choice with the insert that claims it
    alloc: Mutex<()>,
}

impl InMemoryRuntime {
    /// Engine with the default port range and catalog
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    /// Engine honouring the port range and catalog of `config`
    #[must_use]
    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            containers: DashMap::new(),
            ports: config.port_allocator(),
            catalog: config.catalog.clone(),
            next_id: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
            faults: Mutex::new(HashMap::new()),
            exec_output: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            fail_startup: AtomicBool::new(false),
            alloc: Mutex::new(()),
        }
    }

    /// Make every call fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next call of `op` with `error`
    pub fn fail_next(&self, op: RuntimeOp, error: RuntimeError) {
        self.faults.lock().insert(op, error);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// New containers exit immediately after start
    pub fn set_fail_startup(&self, fail: bool) {
        self.fail_startup.store(fail, Ordering::SeqCst);
    }

    /// Force the live state of a container
    pub fn set_status(&self, id: &str, state: LiveStatus) {
        if let Some(mut c) = self.containers.get_mut(id) {
            c.state = state;
        }
    }

    /// Delete a container without going through the runtime API
    pub fn vanish(&self, id: &str) {
        self.containers.remove(id);
    }

    /// Drop the host binding of a container
    pub fn clear_port_mapping(&self, id: &str) {
        if let Some(mut c) = self.containers.get_mut(id) {
            c.host_port = None;
        }
    }

    /// Register a running managed container no record points at
    pub fn inject_orphan(&self, id: impl Into<String>) -> String {
        let id = id.into();
        let mut labels = HashMap::new();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        self.containers.insert(
            id.clone(),
            MemContainer {
                id: id.clone(),
                name: format!("orphan-{id}"),
                image: self.catalog.default_image.clone(),
                scenario_type: "unknown".to_string(),
                state: LiveStatus::Running,
                host_port: None,
                container_port: crate::types::SHELL_PORT,
                labels,
                script: None,
            },
        );
        id
    }

    /// Register a container without the managed label
    pub fn inject_foreign(&self, id: impl Into<String>) -> String {
        let id = id.into();
        self.containers.insert(
            id.clone(),
            MemContainer {
                id: id.clone(),
                name: format!("foreign-{id}"),
                image: "postgres:16".to_string(),
                scenario_type: String::new(),
                state: LiveStatus::Running,
                host_port: None,
                container_port: 5432,
                labels: HashMap::new(),
                script: None,
            },
        );
        id
    }

    /// Canned output for `exec` on `id`
    pub fn set_exec_output(&self, id: &str, output: impl Into<String>) {
        self.exec_output.lock().insert(id.to_string(), output.into());
    }

    /// Whether `id` exists
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    /// Snapshot of one container
    #[must_use]
    pub fn container(&self, id: &str) -> Option<MemContainer> {
        self.containers.get(id).map(|c| c.clone())
    }

    /// Number of containers, managed or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// No containers at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// IDs of every container
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.containers.iter().map(|c| c.key().clone()).collect();
        ids.sort();
        ids
    }

    async fn enter(&self, op: RuntimeOp) -> RuntimeResult<()> {
        let latency = *self.latency.lock();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RuntimeError::Unavailable(
                "in-memory engine marked unavailable".to_string(),
            ));
        }
        match self.faults.lock().remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn get(&self, id: &str) -> RuntimeResult<MemContainer> {
        self.container(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    fn bound_ports(&self) -> Vec<u16> {
        self.containers.iter().filter_map(|c| c.host_port).collect()
    }
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_and_start(&self, request: &ProvisionRequest) -> RuntimeResult<Provisioned> {
        self.enter(RuntimeOp::Create).await?;

        let claim = self.alloc.lock();
        let bound = self.bound_ports();
        let host_port = self.ports.probe(|p| !bound.contains(&p))?;

        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("mem-{seq:012x}");
        let name = request.name.clone().unwrap_or_else(|| id.clone());
        let image = self.catalog.image_for(&request.scenario_type).to_string();
        let script = crate::script::startup_script(
            request.container_port,
            self.catalog.is_kubernetes(&request.scenario_type),
            request.script.as_deref(),
        );

        if self.fail_startup.load(Ordering::SeqCst) {
            return Err(RuntimeError::StartupFailed {
                id,
                reason: "container exited during startup".to_string(),
            });
        }

        self.containers.insert(
            id.clone(),
            MemContainer {
                id: id.clone(),
                name,
                image,
                scenario_type: request.scenario_type.clone(),
                state: LiveStatus::Running,
                host_port: Some(host_port),
                container_port: request.container_port,
                labels: request.all_labels(),
                script: Some(script),
            },
        );
        drop(claim);
        tracing::debug!(container_id = %id, host_port, "in-memory container started");

        Ok(Provisioned {
            container_id: id,
            host_port,
        })
    }

    async fn status(&self, id: &str) -> RuntimeResult<LiveStatus> {
        self.enter(RuntimeOp::Status).await?;
        Ok(self.get(id)?.state)
    }

    async fn exists(&self, id: &str) -> RuntimeResult<bool> {
        self.enter(RuntimeOp::Exists).await?;
        Ok(self.contains(id))
    }

    async fn terminal_address(&self, id: &str, container_port: u16) -> RuntimeResult<HostAddress> {
        self.enter(RuntimeOp::TerminalAddress).await?;
        let c = self.get(id)?;
        if !c.state.is_running() {
            return Err(RuntimeError::NotRunning {
                id: id.to_string(),
                state: c.state.to_string(),
            });
        }
        match c.host_port {
            Some(host_port) if c.container_port == container_port => Ok(HostAddress {
                host_ip: "0.0.0.0".to_string(),
                host_port,
            }),
            _ => Err(RuntimeError::NoPortMapping {
                id: id.to_string(),
                port: container_port,
            }),
        }
    }

    async fn stop(&self, id: &str) -> RuntimeResult<()> {
        self.enter(RuntimeOp::Stop).await?;
        let mut c = self
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        if !c.state.is_stopped() {
            c.state = LiveStatus::Exited;
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> RuntimeResult<()> {
        self.enter(RuntimeOp::Remove).await?;
        self.containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn exec(&self, id: &str, command: &[String]) -> RuntimeResult<String> {
        self.enter(RuntimeOp::Exec).await?;
        if command.is_empty() {
            return Err(RuntimeError::InvalidArgument("empty command".to_string()));
        }
        let c = self.get(id)?;
        if !c.state.is_running() {
            return Err(RuntimeError::NotRunning {
                id: id.to_string(),
                state: c.state.to_string(),
            });
        }
        Ok(self.exec_output.lock().get(id).cloned().unwrap_or_default())
    }

    async fn list(&self) -> RuntimeResult<Vec<ContainerInfo>> {
        self.enter(RuntimeOp::List).await?;
        let mut out: Vec<ContainerInfo> = self
            .containers
            .iter()
            .filter(|c| c.labels.contains_key(MANAGED_LABEL))
            .map(|c| ContainerInfo {
                id: c.id.clone(),
                name: c.name.clone(),
                state: c.state.to_string(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}
