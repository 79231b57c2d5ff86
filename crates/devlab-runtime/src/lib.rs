//! # DevLab Runtime
//!
//! Container runtime contract for DevLab sandboxes.
//!
//! ## Backends
//!
//! - [`DockerRuntime`]: the local Docker daemon via bollard
//! - [`InMemoryRuntime`]: deterministic engine with fault injection for tests
//!
//! Every sandbox publishes its interactive shell on [`SHELL_PORT`] inside the
//! container, bound to a free host port from [`RuntimeConfig`]'s range.

pub mod catalog;
pub mod config;
pub mod docker;
pub mod error;
pub mod memory;
pub mod ports;
pub mod runtime;
pub mod script;
pub mod types;

pub use catalog::{ImageCatalog, Maturity, ScenarioTypeInfo, DEFAULT_IMAGE};
pub use config::RuntimeConfig;
pub use docker::DockerRuntime;
pub use error::{RuntimeError, RuntimeResult};
pub use memory::{InMemoryRuntime, MemContainer, RuntimeOp};
pub use ports::PortAllocator;
pub use runtime::{ContainerRuntime, Removal};
pub use types::{
    ContainerInfo, HostAddress, LiveStatus, ProvisionRequest, Provisioned, MANAGED_LABEL,
    SCENARIO_TYPE_LABEL, SHELL_PORT,
};
