//! Runtime backend configuration

use crate::catalog::ImageCatalog;
use crate::ports::PortAllocator;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Container runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// First host port handed to sandboxes
    pub port_range_start: u16,
    /// Last host port handed to sandboxes
    pub port_range_end: u16,
    /// Wait after start before checking the container stayed up
    #[serde(with = "humantime_serde")]
    pub startup_grace: Duration,
    /// Grace period given to a container on stop
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
    /// Scenario type → image mapping
    pub catalog: ImageCatalog,
}

impl RuntimeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With host port range
    #[inline]
    #[must_use]
    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_range_start = start;
        self.port_range_end = end;
        self
    }

    /// With startup grace period
    #[inline]
    #[must_use]
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// With default image for unknown types
    #[inline]
    #[must_use]
    pub fn with_default_image(mut self, image: impl Into<String>) -> Self {
        self.catalog = self.catalog.with_default_image(image);
        self
    }

    /// Allocator over the configured range
    #[inline]
    #[must_use]
    pub fn port_allocator(&self) -> PortAllocator {
        PortAllocator::new(self.port_range_start, self.port_range_end)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            port_range_start: 3001,
            port_range_end: 3009,
            startup_grace: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(10),
            catalog: ImageCatalog::default(),
        }
    }
}
