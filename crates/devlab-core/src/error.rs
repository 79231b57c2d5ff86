//! Error types for the scenario lifecycle
//!
//! Every failure the manager surfaces falls into one [`ErrorKind`], which a
//! transport maps to its own status codes:
//! - Caller mistakes (`InvalidInput`)
//! - Missing records (`NotFound`)
//! - State conflicts (`NotRunning`, `AlreadyStopped`)
//! - Infrastructure failures a caller may retry (`RuntimeUnavailable`,
//!   `PortExhausted`, `StartupFailed`)
//! - Everything else (`Storage`, `Internal`)

use devlab_runtime::RuntimeError;
use devlab_store::StoreError;
use std::time::Duration;

/// Lifecycle manager error
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Required field missing or blank
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No such scenario
    #[error("scenario not found: {0}")]
    NotFound(String),

    /// Scenario has no running resource
    #[error("scenario {scenario_id} is not running: {reason}")]
    NotRunning { scenario_id: String, reason: String },

    /// Scenario was already reclaimed
    #[error("scenario {0} is already stopped")]
    AlreadyStopped(String),

    /// Container engine unreachable
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// No free host port
    #[error("no free host port in range {start}-{end}")]
    PortExhausted { start: u16, end: u16 },

    /// Container exited during startup
    #[error("container failed to start: {0}")]
    StartupFailed(String),

    /// Runtime call exceeded its deadline
    #[error("runtime call timed out after {0:?}")]
    Timeout(Duration),

    /// Other engine failure
    #[error("runtime error: {0}")]
    Runtime(#[source] RuntimeError),

    /// Metadata store failure
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Closed classification of [`ScenarioError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller mistake
    InvalidInput,
    /// Missing record
    NotFound,
    /// Scenario not running
    NotRunning,
    /// Scenario already reclaimed
    AlreadyStopped,
    /// Engine unreachable or too slow
    RuntimeUnavailable,
    /// Host ports exhausted
    PortExhausted,
    /// Container died on startup
    StartupFailed,
    /// Metadata store failure
    Storage,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotRunning => "not_running",
            ErrorKind::AlreadyStopped => "already_stopped",
            ErrorKind::RuntimeUnavailable => "runtime_unavailable",
            ErrorKind::PortExhausted => "port_exhausted",
            ErrorKind::StartupFailed => "startup_failed",
            ErrorKind::Storage => "storage",
            ErrorKind::Internal => "internal",
        }
    }

    /// Canonical HTTP status
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::NotRunning | ErrorKind::AlreadyStopped => 409,
            ErrorKind::RuntimeUnavailable | ErrorKind::PortExhausted | ErrorKind::StartupFailed => {
                503
            }
            ErrorKind::Storage | ErrorKind::Internal => 500,
        }
    }
}

impl ScenarioError {
    /// Classification for transports
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScenarioError::InvalidInput(_) => ErrorKind::InvalidInput,
            ScenarioError::NotFound(_) => ErrorKind::NotFound,
            ScenarioError::NotRunning { .. } => ErrorKind::NotRunning,
            ScenarioError::AlreadyStopped(_) => ErrorKind::AlreadyStopped,
            ScenarioError::RuntimeUnavailable(_) | ScenarioError::Timeout(_) => {
                ErrorKind::RuntimeUnavailable
            }
            ScenarioError::PortExhausted { .. } => ErrorKind::PortExhausted,
            ScenarioError::StartupFailed(_) => ErrorKind::StartupFailed,
            ScenarioError::Storage(_) => ErrorKind::Storage,
            ScenarioError::Runtime(_) => ErrorKind::Internal,
        }
    }

    /// Infrastructure failure worth retrying
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RuntimeUnavailable | ErrorKind::PortExhausted | ErrorKind::StartupFailed
        )
    }

    /// Create invalid-input error
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create not-running error
    #[inline]
    pub fn not_running(scenario_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotRunning {
            scenario_id: scenario_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<RuntimeError> for ScenarioError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Unavailable(msg) => Self::RuntimeUnavailable(msg),
            RuntimeError::Timeout(after) => Self::Timeout(after),
            RuntimeError::PortExhausted { start, end } => Self::PortExhausted { start, end },
            RuntimeError::StartupFailed { id, reason } => {
                Self::StartupFailed(format!("{id}: {reason}"))
            }
            other => Self::Runtime(other),
        }
    }
}

/// Result alias for manager operations
pub type ScenarioResult<T> = Result<T, ScenarioError>;
