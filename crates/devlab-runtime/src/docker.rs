//! Docker backend over bollard
//!
//! Sandboxes are ordinary containers carrying the `devlab.managed` label.
//! The shell port is published on all interfaces at a host port picked from
//! the configured range; ports handed out but not yet visible to the daemon
//! are held in a reservation set so concurrent starts never collide. A
//! reservation is released when its guard drops, including when the start
//! future is abandoned mid-flight.

use crate::catalog::ImageCatalog;
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::ports::PortAllocator;
use crate::runtime::ContainerRuntime;
use crate::script::{container_command, startup_script};
use crate::types::{
    ContainerInfo, HostAddress, LiveStatus, ProvisionRequest, Provisioned, MANAGED_LABEL,
};
use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, ContainerInspectResponse, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, InspectContainerOptions, ListContainersOptionsBuilder,
    RemoveContainerOptionsBuilder, StartContainerOptions, StopContainerOptionsBuilder,
};
use bollard::Docker;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Docker-backed [`ContainerRuntime`]
pub struct DockerRuntime {
    docker: Docker,
    ports: PortAllocator,
    catalog: ImageCatalog,
    startup_grace: Duration,
    stop_timeout: Duration,
    reserved: Mutex<HashSet<u16>>,
}

impl std::fmt::Debug for DockerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerRuntime")
            .field("ports", &self.ports)
            .field("startup_grace", &self.startup_grace)
            .finish_non_exhaustive()
    }
}

impl DockerRuntime {
    /// Connect to the local daemon using the standard environment
    ///
    /// # Errors
    /// - `RuntimeError::Unavailable` if the client cannot be configured
    pub fn connect(config: &RuntimeConfig) -> RuntimeResult<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        Ok(Self::with_client(docker, config))
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(docker: Docker, config: &RuntimeConfig) -> Self {
        Self {
            docker,
            ports: config.port_allocator(),
            catalog: config.catalog.clone(),
            startup_grace: config.startup_grace,
            stop_timeout: config.stop_timeout,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Check the daemon answers
    ///
    /// # Errors
    /// - `RuntimeError::Unavailable` if it does not
    pub async fn ping(&self) -> RuntimeResult<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))
    }

    async fn inspect(&self, id: &str) -> RuntimeResult<ContainerInspectResponse> {
        self.docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_err("inspect_container", id, e))
    }

    fn reserve_port(&self) -> RuntimeResult<PortReservation<'_>> {
        let mut reserved = self.reserved.lock();
        let taken: Vec<u16> = reserved.iter().copied().collect();
        let port = self.ports.allocate(&taken)?;
        reserved.insert(port);
        Ok(PortReservation {
            reserved: &self.reserved,
            port,
        })
    }

    fn container_body(&self, request: &ProvisionRequest, host_port: u16) -> ContainerCreateBody {
        let script = startup_script(
            request.container_port,
            self.catalog.is_kubernetes(&request.scenario_type),
            request.script.as_deref(),
        );
        let port_key = format!("{}/tcp", request.container_port);

        ContainerCreateBody {
            image: Some(self.catalog.image_for(&request.scenario_type).to_string()),
            cmd: Some(container_command(script)),
            labels: Some(request.all_labels()),
            exposed_ports: Some(HashMap::from([(port_key.clone(), HashMap::new())])),
            host_config: Some(HostConfig {
                port_bindings: Some(HashMap::from([(
                    port_key,
                    Some(vec![PortBinding {
                        host_ip: Some("0.0.0.0".to_string()),
                        host_port: Some(host_port.to_string()),
                    }]),
                )])),
                ..HostConfig::default()
            }),
            ..ContainerCreateBody::default()
        }
    }

    async fn launch(&self, request: &ProvisionRequest, host_port: u16) -> RuntimeResult<String> {
        let image = self.catalog.image_for(&request.scenario_type).to_string();
        let body = self.container_body(request, host_port);

        let mut options = CreateContainerOptionsBuilder::new();
        if let Some(name) = &request.name {
            options = options.name(name);
        }
        let created = self
            .docker
            .create_container(Some(options.build()), body)
            .await
            .map_err(|e| map_err("create_container", &image, e))?;
        let id = created.id;
        tracing::debug!(container_id = %id, image = %image, host_port, "container created");

        if let Err(e) = self
            .docker
            .start_container(&id, None::<StartContainerOptions>)
            .await
        {
            self.discard(&id).await;
            return Err(map_err("start_container", &id, e));
        }

        tokio::time::sleep(self.startup_grace).await;

        let state = match self.status(&id).await {
            Ok(state) => state,
            Err(e) => {
                self.discard(&id).await;
                return Err(e);
            }
        };
        if !state.is_running() {
            self.discard(&id).await;
            return Err(RuntimeError::StartupFailed {
                id,
                reason: format!("container is {state} after startup"),
            });
        }
        Ok(id)
    }

    async fn discard(&self, id: &str) {
        if let Err(e) = self.remove(id).await {
            if !e.is_not_found() {
                tracing::warn!(container_id = id, error = %e, "failed to remove container after failed startup");
            }
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn create_and_start(&self, request: &ProvisionRequest) -> RuntimeResult<Provisioned> {
        let reservation = self.reserve_port()?;
        let host_port = reservation.port;
        let launched = self.launch(request, host_port).await;
        drop(reservation);

        let container_id = launched?;
        tracing::info!(container_id = %container_id, host_port, "container started");
        Ok(Provisioned {
            container_id,
            host_port,
        })
    }

    async fn status(&self, id: &str) -> RuntimeResult<LiveStatus> {
        let info = self.inspect(id).await?;
        let state = info
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_default();
        Ok(LiveStatus::parse(&state))
    }

    async fn exists(&self, id: &str) -> RuntimeResult<bool> {
        match self.inspect(id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn terminal_address(&self, id: &str, container_port: u16) -> RuntimeResult<HostAddress> {
        let info = self.inspect(id).await?;

        let state = info
            .state
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .map(|s| LiveStatus::parse(&s.to_string()))
            .unwrap_or_else(|| LiveStatus::Other(String::new()));
        if !state.is_running() {
            return Err(RuntimeError::NotRunning {
                id: id.to_string(),
                state: state.to_string(),
            });
        }

        let key = format!("{container_port}/tcp");
        let binding = info
            .network_settings
            .and_then(|n| n.ports)
            .and_then(|mut ports| ports.remove(&key))
            .flatten()
            .and_then(|bindings| bindings.into_iter().next());

        let no_mapping = || RuntimeError::NoPortMapping {
            id: id.to_string(),
            port: container_port,
        };
        let binding = binding.ok_or_else(no_mapping)?;
        let host_port = binding
            .host_port
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(no_mapping)?;

        Ok(HostAddress {
            host_ip: binding.host_ip.unwrap_or_default(),
            host_port,
        })
    }

    async fn stop(&self, id: &str) -> RuntimeResult<()> {
        let timeout = i32::try_from(self.stop_timeout.as_secs()).unwrap_or(i32::MAX);
        match self
            .docker
            .stop_container(id, Some(StopContainerOptionsBuilder::new().t(timeout).build()))
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_err("stop_container", id, e)),
        }
    }

    async fn remove(&self, id: &str) -> RuntimeResult<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptionsBuilder::new().force(true).v(true).build()),
            )
            .await
            .map_err(|e| map_err("remove_container", id, e))
    }

    async fn exec(&self, id: &str, command: &[String]) -> RuntimeResult<String> {
        if command.is_empty() {
            return Err(RuntimeError::InvalidArgument("empty command".to_string()));
        }

        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(command.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| map_err("create_exec", id, e))?;

        let mut output = String::new();
        match self
            .docker
            .start_exec(&exec.id, None::<StartExecOptions>)
            .await
            .map_err(|e| map_err("start_exec", id, e))?
        {
            StartExecResults::Attached { output: mut stream, .. } => {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| map_err("start_exec", id, e))?;
                    output.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
                }
            }
            StartExecResults::Detached => {}
        }

        let inspected = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| map_err("inspect_exec", id, e))?;
        match inspected.exit_code {
            Some(0) | None => Ok(output),
            Some(exit_code) => Err(RuntimeError::ExecFailed {
                id: id.to_string(),
                exit_code,
                output,
            }),
        }
    }

    async fn list(&self) -> RuntimeResult<Vec<ContainerInfo>> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptionsBuilder::new().all(true).build()))
            .await
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;

        Ok(summaries
            .into_iter()
            .filter(|c| {
                c.labels
                    .as_ref()
                    .is_some_and(|labels| labels.contains_key(MANAGED_LABEL))
            })
            .filter_map(|c| {
                let id = c.id?;
                let name = c
                    .names
                    .and_then(|n| n.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();
                let state = c.state.map(|s| s.to_string()).unwrap_or_default();
                Some(ContainerInfo { id, name, state })
            })
            .collect())
    }
}

/// Host port held back from other starts until dropped
struct PortReservation<'a> {
    reserved: &'a Mutex<HashSet<u16>>,
    port: u16,
}

impl Drop for PortReservation<'_> {
    fn drop(&mut self) {
        self.reserved.lock().remove(&self.port);
    }
}

/// Classify a bollard error: 404 is `NotFound`, other daemon answers are
/// engine errors, anything else means the daemon could not be reached
fn map_err(operation: &'static str, id: &str, err: BollardError) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(id.to_string()),
        BollardError::DockerResponseServerError { message, .. } => {
            RuntimeError::engine(operation, message)
        }
        other => RuntimeError::Unavailable(other.to_string()),
    }
}
