//! Error types for container runtime operations
//!
//! Failures are classified at the engine boundary so callers never have to
//! inspect message text:
//! - Engine connectivity (`Unavailable`, `Timeout`, `Cancelled`)
//! - Resource state conflicts (`NotFound`, `NotRunning`, `NoPortMapping`)
//! - Provisioning failures (`PortExhausted`, `StartupFailed`)
//! - Command failures inside a resource (`ExecFailed`)

use std::time::Duration;

/// Container runtime error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// Engine unreachable
    #[error("container engine unavailable: {0}")]
    Unavailable(String),

    /// No such resource
    #[error("container not found: {0}")]
    NotFound(String),

    /// Resource exists but is not running
    #[error("container {id} is not running (state: {state})")]
    NotRunning { id: String, state: String },

    /// No free host port in the configured range
    #[error("no free host port in range {start}-{end}")]
    PortExhausted { start: u16, end: u16 },

    /// Resource exited right after creation
    #[error("container {id} failed to start: {reason}")]
    StartupFailed { id: String, reason: String },

    /// Resource has no host binding for the requested port
    #[error("container {id} has no host mapping for port {port}/tcp")]
    NoPortMapping { id: String, port: u16 },

    /// Command exited non-zero
    #[error("command in {id} exited with code {exit_code}")]
    ExecFailed {
        id: String,
        exit_code: i64,
        output: String,
    },

    /// Caller passed an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Engine answered with an error
    #[error("engine error during {operation}: {message}")]
    Engine {
        operation: &'static str,
        message: String,
    },

    /// Call exceeded its deadline
    #[error("runtime call timed out after {0:?}")]
    Timeout(Duration),

    /// Caller abandoned the call on shutdown
    #[error("runtime call cancelled")]
    Cancelled,
}

impl RuntimeError {
    /// Resource is already gone
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Infrastructure failure a caller may retry
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout(_) | Self::PortExhausted { .. }
        )
    }

    /// Create engine error
    #[inline]
    pub fn engine(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            operation,
            message: message.into(),
        }
    }
}

/// Result alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
