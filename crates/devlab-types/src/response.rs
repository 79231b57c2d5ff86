//! Response shapes returned by the lifecycle manager
//!
//! These are transport-neutral; the transport layer encodes them as it sees
//! fit (JSON field names match the historical REST payloads).

use crate::scenario::{ScenarioId, ScenarioStatus};
use crate::tree::FileNode;
use serde::{Deserialize, Serialize};

/// Result of provisioning a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartScenarioResponse {
    /// Newly generated ID
    pub scenario_id: ScenarioId,
    /// Always `provisioning` on success
    pub status: ScenarioStatus,
}

/// Reconciled status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStatusResponse {
    /// Scenario
    pub scenario_id: ScenarioId,
    /// Owner
    pub user_id: String,
    /// Scenario type
    pub scenario_type: String,
    /// Backing resource
    pub container_id: String,
    /// Status after reconciliation
    pub status: ScenarioStatus,
    /// Raw runtime state (`not_found`, `unknown`, or the engine's state)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_status: Option<String>,
    /// Human-readable note
    pub message: String,
}

/// Reachable terminal address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalUrlResponse {
    /// Scenario
    pub scenario_id: ScenarioId,
    /// `http://host:port`
    pub url: String,
    /// Human-readable note
    pub message: String,
}

/// Workspace tree snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStructureResponse {
    /// Scenario
    pub scenario_id: ScenarioId,
    /// Tree root
    pub path: String,
    /// Flat node list, linked by path
    pub structure: Vec<FileNode>,
    /// Human-readable note
    pub message: String,
}
