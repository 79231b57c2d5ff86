//! Container runtime contract
//!
//! The manager and the cleanup worker only ever talk to a container engine
//! through [`ContainerRuntime`]. Two backends implement it: Docker via
//! bollard, and an in-memory engine used by tests.

use crate::error::RuntimeResult;
use crate::types::{ContainerInfo, HostAddress, LiveStatus, ProvisionRequest, Provisioned};
use async_trait::async_trait;

/// Outcome of a stop-and-remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Resource existed and was removed
    Removed,
    /// Resource was already gone
    AlreadyGone,
}

/// Abstract container engine
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Create and start a sandbox, binding the shell port to a free host port
    ///
    /// A resource that fails to stay up is removed before the error returns.
    async fn create_and_start(&self, request: &ProvisionRequest) -> RuntimeResult<Provisioned>;

    /// Current live status
    async fn status(&self, id: &str) -> RuntimeResult<LiveStatus>;

    /// Whether the resource exists
    async fn exists(&self, id: &str) -> RuntimeResult<bool>;

    /// Host address bound to `container_port`; the resource must be running
    async fn terminal_address(&self, id: &str, container_port: u16) -> RuntimeResult<HostAddress>;

    /// Stop the resource without removing it
    async fn stop(&self, id: &str) -> RuntimeResult<()>;

    /// Force-remove the resource
    async fn remove(&self, id: &str) -> RuntimeResult<()>;

    /// Run a command and return its combined output
    async fn exec(&self, id: &str, command: &[String]) -> RuntimeResult<String>;

    /// Resources owned by DevLab
    async fn list(&self) -> RuntimeResult<Vec<ContainerInfo>>;

    /// Stop then remove, treating an absent resource as success
    async fn stop_and_remove(&self, id: &str) -> RuntimeResult<Removal> {
        match self.stop(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(Removal::AlreadyGone),
            Err(e) => {
                tracing::debug!(container_id = id, error = %e, "stop failed, forcing removal");
            }
        }
        match self.remove(id).await {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.is_not_found() => Ok(Removal::AlreadyGone),
            Err(e) => Err(e),
        }
    }
}
