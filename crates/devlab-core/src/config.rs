//! Lifecycle manager configuration

use crate::tree::DEFAULT_DENYLIST;
use devlab_runtime::SHELL_PORT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default workspace root inside every sandbox
pub const DEFAULT_WORKSPACE_ROOT: &str = "/home/devlab";

/// Lifecycle manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Root of the directory snapshot
    pub workspace_root: String,
    /// Paths under the root left out of snapshots
    pub denylist: Vec<String>,
    /// Host name substituted for wildcard bind addresses in terminal URLs
    pub public_host: String,
    /// Deadline for a single runtime call
    #[serde(with = "humantime_serde")]
    pub runtime_timeout: Duration,
    /// Shell port inside the sandbox
    pub terminal_port: u16,
}

impl ManagerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With public host
    #[inline]
    #[must_use]
    pub fn with_public_host(mut self, host: impl Into<String>) -> Self {
        self.public_host = host.into();
        self
    }

    /// With runtime call deadline
    #[inline]
    #[must_use]
    pub fn with_runtime_timeout(mut self, timeout: Duration) -> Self {
        self.runtime_timeout = timeout;
        self
    }

    /// With workspace root
    #[inline]
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<String>) -> Self {
        self.workspace_root = root.into();
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workspace_root: DEFAULT_WORKSPACE_ROOT.to_string(),
            denylist: DEFAULT_DENYLIST.iter().map(|p| (*p).to_string()).collect(),
            public_host: "localhost".to_string(),
            runtime_timeout: Duration::from_secs(60),
            terminal_port: SHELL_PORT,
        }
    }
}
