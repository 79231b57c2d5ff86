//! DevLab shared types
//!
//! Types shared by every layer of the scenario lifecycle:
//! - Scenario records and their lifecycle states
//! - File-tree nodes produced from a workspace listing
//! - Response shapes handed to the transport layer
//!
//! Field names of [`Scenario`] are a persistence contract: stores and
//! external inspection tooling read them verbatim.

#![warn(unreachable_pub)]

pub mod response;
pub mod scenario;
pub mod tree;

pub use response::{
    DirectoryStructureResponse, ScenarioStatusResponse, StartScenarioResponse,
    TerminalUrlResponse,
};
pub use scenario::{ParseStatusError, Scenario, ScenarioId, ScenarioStatus};
pub use tree::{FileNode, NodeType};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
