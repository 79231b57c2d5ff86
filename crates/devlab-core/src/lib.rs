//! # DevLab Core
//!
//! Scenario lifecycle over two independently mutable sources of truth: the
//! container runtime and the metadata store.
//!
//! ## Modules
//!
//! - [`manager`]: the five lifecycle operations plus catalog listing
//! - [`reconcile`]: pure stored-vs-live status rule
//! - [`tree`]: workspace listing parser and tree builder
//! - [`error`]: closed error taxonomy for transports
//!
//! ## Example
//!
//! ```rust,no_run
//! use devlab_core::{ManagerConfig, ScenarioManager};
//! use devlab_runtime::InMemoryRuntime;
//! use devlab_store::MemoryScenarioStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), devlab_core::ScenarioError> {
//! let manager = ScenarioManager::new(
//!     Arc::new(InMemoryRuntime::new()),
//!     Arc::new(MemoryScenarioStore::new()),
//!     ManagerConfig::default(),
//! );
//! let started = manager.start_scenario("alice", "go", None).await?;
//! let status = manager.get_scenario_status(started.scenario_id.as_str()).await?;
//! println!("{}", status.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod reconcile;
pub mod tree;

pub use config::{ManagerConfig, DEFAULT_WORKSPACE_ROOT};
pub use error::{ErrorKind, ScenarioError, ScenarioResult};
pub use manager::{ScenarioManager, SCENARIO_ID_LABEL};
pub use reconcile::{reconcile, reconcile_missing};
pub use tree::{build_tree, listing_command, parse_listing, ListingEntry, DEFAULT_DENYLIST};
