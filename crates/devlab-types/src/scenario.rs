//! Scenario record and lifecycle states
//!
//! A scenario moves through `provisioning → running → stopped → cleaned_up`.
//! Transitions are checked against a fixed table; `cleaned_up` is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Prefix carried by every generated scenario ID
pub const SCENARIO_ID_PREFIX: &str = "scn-";

/// Unique scenario identifier (`scn-<ULID>`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioId(String);

impl ScenarioId {
    /// Generate a fresh ID
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{SCENARIO_ID_PREFIX}{}", Ulid::new()))
    }

    /// Wrap an existing ID without validation
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is empty or whitespace
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScenarioId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ScenarioId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ScenarioId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Persisted lifecycle state of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Runtime resource created, shell service not yet observed running
    Provisioning,
    /// Runtime resource observed running
    Running,
    /// Stopped on request or after the resource disappeared
    Stopped,
    /// Reclaimed by the cleanup worker
    CleanedUp,
}

impl ScenarioStatus {
    /// All states, in lifecycle order
    pub const ALL: [ScenarioStatus; 4] = [
        ScenarioStatus::Provisioning,
        ScenarioStatus::Running,
        ScenarioStatus::Stopped,
        ScenarioStatus::CleanedUp,
    ];

    /// Wire/storage name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Provisioning => "provisioning",
            ScenarioStatus::Running => "running",
            ScenarioStatus::Stopped => "stopped",
            ScenarioStatus::CleanedUp => "cleaned_up",
        }
    }

    /// Holds a live runtime resource (eligible for expiry)
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, ScenarioStatus::Provisioning | ScenarioStatus::Running)
    }

    /// No further transitions possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioStatus::CleanedUp)
    }

    /// States reachable from `self` in one step
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [ScenarioStatus] {
        use ScenarioStatus::{CleanedUp, Provisioning, Running, Stopped};
        match self {
            Provisioning => &[Running, Stopped, CleanedUp],
            Running => &[Stopped, CleanedUp],
            Stopped => &[CleanedUp],
            CleanedUp => &[],
        }
    }

    /// Whether `self → to` is a legal transition
    #[inline]
    #[must_use]
    pub fn can_transition_to(self, to: ScenarioStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scenario status: '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for ScenarioStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(ScenarioStatus::Provisioning),
            "running" => Ok(ScenarioStatus::Running),
            "stopped" => Ok(ScenarioStatus::Stopped),
            "cleaned_up" => Ok(ScenarioStatus::CleanedUp),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Persisted scenario document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Globally unique, immutable
    pub scenario_id: ScenarioId,
    /// Owner
    pub user_id: String,
    /// Selects the runtime image
    pub scenario_type: String,
    /// Backing runtime resource, bound once at creation
    pub container_id: String,
    /// Lifecycle state
    pub status: ScenarioStatus,
    /// Host port mapped to the interactive shell
    pub terminal_port: u16,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status mutation
    pub updated_at: DateTime<Utc>,
}

impl Scenario {
    /// New record in `provisioning`, stamped now
    #[must_use]
    pub fn new(
        scenario_id: ScenarioId,
        user_id: impl Into<String>,
        scenario_type: impl Into<String>,
        container_id: impl Into<String>,
        terminal_port: u16,
    ) -> Self {
        let now = Utc::now();
        Self {
            scenario_id,
            user_id: user_id.into(),
            scenario_type: scenario_type.into(),
            container_id: container_id.into(),
            status: ScenarioStatus::Provisioning,
            terminal_port,
            created_at: now,
            updated_at: now,
        }
    }

    /// Override creation time (and `updated_at`), for imports and fixtures
    #[inline]
    #[must_use]
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }

    /// Apply a status change if it is legal and not a no-op.
    ///
    /// Returns `true` when the record changed; `updated_at` moves only then.
    pub fn transition(&mut self, to: ScenarioStatus, at: DateTime<Utc>) -> bool {
        if self.status == to || !self.status.can_transition_to(to) {
            return false;
        }
        self.status = to;
        self.updated_at = at;
        true
    }

    /// Whether the record references a runtime resource
    #[inline]
    #[must_use]
    pub fn has_container(&self) -> bool {
        !self.container_id.is_empty()
    }
}
