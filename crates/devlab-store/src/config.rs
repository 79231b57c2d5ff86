//! Store selection

use crate::error::StoreResult;
use crate::memory::MemoryScenarioStore;
use crate::sqlite::SqliteScenarioStore;
use crate::store::ScenarioStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Which backend holds scenario records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, lost on exit
    Memory,
    /// SQLite file
    #[default]
    Sqlite,
}

/// Metadata store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend
    pub backend: StoreBackend,
    /// Database file for the SQLite backend
    pub sqlite_path: PathBuf,
}

impl StoreConfig {
    /// In-memory store
    #[inline]
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Self::default()
        }
    }

    /// With SQLite database file
    #[inline]
    #[must_use]
    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backend = StoreBackend::Sqlite;
        self.sqlite_path = path.into();
        self
    }

    /// Open the configured backend
    ///
    /// # Errors
    /// - `StoreError::Backend` if the database cannot be opened
    pub fn open(&self) -> StoreResult<Arc<dyn ScenarioStore>> {
        Ok(match self.backend {
            StoreBackend::Memory => Arc::new(MemoryScenarioStore::new()),
            StoreBackend::Sqlite => Arc::new(SqliteScenarioStore::open(&self.sqlite_path)?),
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: PathBuf::from("devlab.db"),
        }
    }
}
