//! # DevLab Store
//!
//! Durable scenario records behind the [`ScenarioStore`] contract.
//!
//! ## Backends
//!
//! - [`MemoryScenarioStore`]: dashmap, for tests and demos
//! - [`SqliteScenarioStore`]: rusqlite with a bundled SQLite
//!
//! Both give atomic single-record reads and writes plus a status
//! compare-and-set; nothing more is promised.

pub mod config;
pub mod error;
pub mod filter;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use config::{StoreBackend, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use filter::ScenarioFilter;
pub use memory::MemoryScenarioStore;
pub use sqlite::SqliteScenarioStore;
pub use store::{Advanced, ScenarioStore};
