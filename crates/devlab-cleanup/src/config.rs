//! Cleanup worker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cleanup worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Run the periodic loop at all
    pub enabled: bool,
    /// Time between cycles
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Age after which a live scenario is reclaimed
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
    /// Deadline for each runtime call made by a sweep
    #[serde(with = "humantime_serde")]
    pub runtime_timeout: Duration,
}

impl WorkerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With cycle interval
    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// With maximum scenario age
    #[inline]
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// With per-call runtime deadline
    #[inline]
    #[must_use]
    pub fn with_runtime_timeout(mut self, timeout: Duration) -> Self {
        self.runtime_timeout = timeout;
        self
    }

    /// Enable or disable the loop
    #[inline]
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(15 * 60),
            max_age: Duration::from_secs(24 * 60 * 60),
            runtime_timeout: Duration::from_secs(60),
        }
    }
}
