//! Layered configuration: defaults, then an optional TOML file, then
//! environment variables.
//!
//! # Environment Variables
//!
//! - `DB_PATH`: SQLite database path
//! - `DOCKER_IMAGE`: image for unknown scenario types
//! - `CLEANUP_MAX_SCENARIO_AGE`: e.g. `24h`
//! - `CLEANUP_INTERVAL`: e.g. `15m`
//! - `CLEANUP_ENABLED`: `true`, `1` or `yes` enable the worker
//! - `DEVLAB_PUBLIC_HOST`: host substituted into terminal URLs

use devlab_cleanup::WorkerConfig;
use devlab_core::ManagerConfig;
use devlab_runtime::RuntimeConfig;
use devlab_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Configuration loading errors
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`DevlabConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything the binary wires together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct DevlabConfig {
    pub(crate) manager: ManagerConfig,
    pub(crate) worker: WorkerConfig,
    pub(crate) runtime: RuntimeConfig,
    pub(crate) store: StoreConfig,
}

impl DevlabConfig {
    /// Load from `path` (if any) and apply process environment overrides
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML document; missing sections keep their defaults
    pub(crate) fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides from `lookup`; empty values are ignored
    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("DB_PATH") {
            self.store = self.store.clone().with_sqlite_path(path);
        }
        if let Some(image) = get("DOCKER_IMAGE") {
            self.runtime = self.runtime.clone().with_default_image(image);
        }
        if let Some(host) = get("DEVLAB_PUBLIC_HOST") {
            self.manager.public_host = host;
        }
        if let Some(raw) = get("CLEANUP_MAX_SCENARIO_AGE") {
            if let Some(age) = parse_duration("CLEANUP_MAX_SCENARIO_AGE", &raw) {
                self.worker.max_age = age;
            }
        }
        if let Some(raw) = get("CLEANUP_INTERVAL") {
            if let Some(interval) = parse_duration("CLEANUP_INTERVAL", &raw) {
                self.worker.interval = interval;
            }
        }
        if let Some(raw) = get("CLEANUP_ENABLED") {
            self.worker.enabled = matches!(raw.trim(), "true" | "1" | "yes");
        }
    }
}

fn parse_duration(key: &str, raw: &str) -> Option<Duration> {
    match humantime::parse_duration(raw.trim()) {
        Ok(d) if !d.is_zero() => Some(d),
        Ok(_) => {
            warn!(key, value = raw, "zero duration ignored, keeping default");
            None
        }
        Err(e) => {
            warn!(key, value = raw, error = %e, "invalid duration, keeping default");
            None
        }
    }
}
