//! Scenario lifecycle manager
//!
//! The manager owns no state beyond its runtime and store handles. Each
//! operation reads the record, consults the runtime, and writes back only
//! when reconciliation actually changes something.
//!
//! # Start ordering
//!
//! The runtime resource is created first and the record persisted second.
//! Whenever the record does not commit (store failure or the caller dropping
//! the future) the resource is stopped and removed again, so no container is
//! left without a record pointing at it.
//!
//! # Concurrent writers
//!
//! The cleanup worker writes the same records. Status changes are
//! compare-and-set through [`ScenarioStore::advance`]; a caller that loses
//! the race reports whatever status the other writer stored.

use crate::config::ManagerConfig;
use crate::error::{ScenarioError, ScenarioResult};
use crate::reconcile::{reconcile, reconcile_missing};
use crate::tree::{build_tree, listing_command, parse_listing};
use chrono::Utc;
use devlab_runtime::{
    ContainerRuntime, ImageCatalog, ProvisionRequest, Removal, RuntimeError, RuntimeResult,
    ScenarioTypeInfo,
};
use devlab_store::{Advanced, ScenarioStore};
use devlab_types::{
    DirectoryStructureResponse, Scenario, ScenarioId, ScenarioStatus, ScenarioStatusResponse,
    StartScenarioResponse, TerminalUrlResponse,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Label linking a container back to its scenario
pub const SCENARIO_ID_LABEL: &str = "devlab.scenario_id";

const STATUS_OK: &str = "Scenario status retrieved successfully";
const STATUS_UNAVAILABLE: &str = "Container status unavailable";
const STATUS_GONE: &str = "Container no longer exists";

/// Scenario lifecycle manager
pub struct ScenarioManager<R: ?Sized, S: ?Sized> {
    runtime: Arc<R>,
    store: Arc<S>,
    config: ManagerConfig,
    catalog: ImageCatalog,
}

impl<R, S> ScenarioManager<R, S>
where
    R: ContainerRuntime + ?Sized + 'static,
    S: ScenarioStore + ?Sized + 'static,
{
    /// Create a manager over `runtime` and `store`
    pub fn new(runtime: Arc<R>, store: Arc<S>, config: ManagerConfig) -> Self {
        Self {
            runtime,
            store,
            config,
            catalog: ImageCatalog::default(),
        }
    }

    /// With the catalog reported by [`Self::list_scenario_types`]
    #[must_use]
    pub fn with_catalog(mut self, catalog: ImageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Configuration
    #[inline]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Runtime handle
    #[inline]
    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    /// Store handle
    #[inline]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Provision a sandbox and persist its record in `provisioning`
    ///
    /// # Errors
    /// - `InvalidInput` for a blank user ID or scenario type
    /// - `PortExhausted`, `StartupFailed`, `RuntimeUnavailable`, `Timeout`
    ///   when the runtime cannot provision
    /// - `Storage` when the record cannot be persisted (the container is
    ///   rolled back first)
    pub async fn start_scenario(
        &self,
        user_id: &str,
        scenario_type: &str,
        script: Option<String>,
    ) -> ScenarioResult<StartScenarioResponse> {
        let user_id = user_id.trim();
        let scenario_type = scenario_type.trim();
        if user_id.is_empty() {
            return Err(ScenarioError::invalid("user ID cannot be empty"));
        }
        if scenario_type.is_empty() {
            return Err(ScenarioError::invalid("scenario type cannot be empty"));
        }

        let scenario_id = ScenarioId::generate();
        let mut request = ProvisionRequest::new(scenario_type)
            .with_script(script)
            .with_name(format!("devlab-{scenario_id}"))
            .with_label(SCENARIO_ID_LABEL, scenario_id.as_str());
        request.container_port = self.config.terminal_port;

        let provisioned = self
            .call(self.runtime.create_and_start(&request))
            .await
            .map_err(|e| {
                error!(scenario_id = %scenario_id, scenario_type, error = %e, "failed to provision container");
                ScenarioError::from(e)
            })?;
        let mut guard = RollbackGuard::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.store),
            &scenario_id,
            &provisioned.container_id,
        );

        let scenario = Scenario::new(
            scenario_id.clone(),
            user_id,
            scenario_type,
            provisioned.container_id.as_str(),
            provisioned.host_port,
        );
        if let Err(e) = self.store.insert(&scenario).await {
            guard.disarm();
            error!(
                scenario_id = %scenario_id,
                container_id = %provisioned.container_id,
                error = %e,
                "failed to persist scenario, rolling back container"
            );
            self.rollback(&provisioned.container_id).await;
            return Err(e.into());
        }
        guard.disarm();

        info!(
            scenario_id = %scenario_id,
            user_id,
            scenario_type,
            container_id = %provisioned.container_id,
            terminal_port = provisioned.host_port,
            "scenario provisioned"
        );
        Ok(StartScenarioResponse {
            scenario_id,
            status: scenario.status,
        })
    }

    /// Reconcile the stored status with the runtime and report it
    ///
    /// Runtime failures are not errors here: the last persisted status is
    /// returned with an explanatory message.
    ///
    /// # Errors
    /// - `InvalidInput` for a blank ID
    /// - `NotFound` if no record exists
    /// - `Storage` if the record cannot be read
    pub async fn get_scenario_status(&self, scenario_id: &str) -> ScenarioResult<ScenarioStatusResponse> {
        let mut scenario = self.load(scenario_id).await?;
        let container_id = scenario.container_id.clone();

        let exists = match self.call(self.runtime.exists(&container_id)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(scenario_id = %scenario.scenario_id, container_id = %container_id, error = %e, "existence check failed");
                return Ok(status_response(&scenario, None, STATUS_UNAVAILABLE));
            }
        };

        let (target, container_status, message) = if exists {
            match self.call(self.runtime.status(&container_id)).await {
                Ok(live) => {
                    debug!(scenario_id = %scenario.scenario_id, live = %live, "probed container");
                    (reconcile(scenario.status, &live), live.to_string(), STATUS_OK)
                }
                Err(e) => {
                    warn!(scenario_id = %scenario.scenario_id, container_id = %container_id, error = %e, "status probe failed");
                    return Ok(status_response(
                        &scenario,
                        Some("unknown".to_string()),
                        STATUS_UNAVAILABLE,
                    ));
                }
            }
        } else {
            (
                reconcile_missing(scenario.status),
                "not_found".to_string(),
                STATUS_GONE,
            )
        };

        let previous = scenario.status;
        if previous != target {
            match self.store.advance(scenario.clone(), target, Utc::now()).await {
                Ok(Advanced { record, written }) => {
                    if written {
                        info!(
                            scenario_id = %record.scenario_id,
                            from = %previous,
                            to = %target,
                            "scenario status reconciled"
                        );
                    } else {
                        debug!(
                            scenario_id = %record.scenario_id,
                            stored = %record.status,
                            "status changed concurrently, keeping stored value"
                        );
                    }
                    scenario = record;
                }
                Err(e) => {
                    warn!(
                        scenario_id = %scenario.scenario_id,
                        to = %target,
                        error = %e,
                        "failed to persist reconciled status"
                    );
                    scenario.transition(target, Utc::now());
                }
            }
        }

        Ok(status_response(&scenario, Some(container_status), message))
    }

    /// Address of the sandbox's interactive shell
    ///
    /// # Errors
    /// - `NotRunning` unless the record is `running` and the container is up
    ///   with its shell port published
    /// - `NotFound`, `InvalidInput`, runtime and storage errors as usual
    pub async fn get_terminal_url(&self, scenario_id: &str) -> ScenarioResult<TerminalUrlResponse> {
        let scenario = self.load(scenario_id).await?;
        let id = scenario.scenario_id.as_str();

        if scenario.status != ScenarioStatus::Running {
            return Err(ScenarioError::not_running(
                id,
                format!("scenario status is {}", scenario.status),
            ));
        }
        if !self.call(self.runtime.exists(&scenario.container_id)).await? {
            return Err(ScenarioError::not_running(
                id,
                format!("container {} not found", scenario.container_id),
            ));
        }

        let address = self
            .call(
                self.runtime
                    .terminal_address(&scenario.container_id, self.config.terminal_port),
            )
            .await
            .map_err(|e| match e {
                RuntimeError::NotFound(cid) => {
                    ScenarioError::not_running(id, format!("container {cid} not found"))
                }
                RuntimeError::NotRunning { state, .. } => {
                    ScenarioError::not_running(id, format!("container is {state}"))
                }
                RuntimeError::NoPortMapping { port, .. } => {
                    ScenarioError::not_running(id, format!("no host mapping for port {port}/tcp"))
                }
                other => other.into(),
            })?;

        Ok(TerminalUrlResponse {
            scenario_id: scenario.scenario_id.clone(),
            url: address.url(&self.config.public_host),
            message: "Terminal URL retrieved successfully".to_string(),
        })
    }

    /// Stop and remove the sandbox, recording `stopped`
    ///
    /// Idempotent: a container that is already gone counts as stopped. A
    /// `cleaned_up` record is left untouched.
    ///
    /// # Errors
    /// - `NotFound`, `InvalidInput`
    /// - runtime errors other than "already gone"
    /// - `Storage` if `stopped` cannot be persisted
    pub async fn stop_scenario(&self, scenario_id: &str) -> ScenarioResult<()> {
        let scenario = self.load(scenario_id).await?;
        if scenario.status.is_terminal() {
            debug!(scenario_id = %scenario.scenario_id, "scenario already cleaned up");
            return Ok(());
        }

        if scenario.has_container() {
            match self.call(self.runtime.stop_and_remove(&scenario.container_id)).await {
                Ok(Removal::Removed) => {
                    info!(scenario_id = %scenario.scenario_id, container_id = %scenario.container_id, "container removed");
                }
                Ok(Removal::AlreadyGone) => {
                    debug!(scenario_id = %scenario.scenario_id, container_id = %scenario.container_id, "container already gone");
                }
                Err(e) => {
                    error!(scenario_id = %scenario.scenario_id, container_id = %scenario.container_id, error = %e, "failed to stop container");
                    return Err(e.into());
                }
            }
        }

        let advanced = self
            .store
            .advance(scenario, ScenarioStatus::Stopped, Utc::now())
            .await?;
        if advanced.written {
            info!(scenario_id = %advanced.record.scenario_id, "scenario stopped");
        } else {
            debug!(
                scenario_id = %advanced.record.scenario_id,
                stored = %advanced.record.status,
                "scenario already at rest"
            );
        }
        Ok(())
    }

    /// Snapshot of the sandbox workspace
    ///
    /// # Errors
    /// - `AlreadyStopped` if the record is `cleaned_up`
    /// - `NotRunning` if the container is gone or not running
    /// - `NotFound`, `InvalidInput`, runtime and storage errors as usual
    pub async fn get_directory_structure(
        &self,
        scenario_id: &str,
    ) -> ScenarioResult<DirectoryStructureResponse> {
        let scenario = self.load(scenario_id).await?;
        let id = scenario.scenario_id.as_str();
        if scenario.status.is_terminal() {
            return Err(ScenarioError::AlreadyStopped(id.to_string()));
        }
        if !self.call(self.runtime.exists(&scenario.container_id)).await? {
            return Err(ScenarioError::not_running(
                id,
                format!("container {} not found", scenario.container_id),
            ));
        }

        let root = self.config.workspace_root.as_str();
        let command = listing_command(root);
        let output = match self
            .call(self.runtime.exec(&scenario.container_id, &command))
            .await
        {
            Ok(output) => output,
            Err(RuntimeError::NotRunning { state, .. }) => {
                return Err(ScenarioError::not_running(id, format!("container is {state}")));
            }
            // find exits non-zero on unreadable entries but still lists the rest
            Err(RuntimeError::ExecFailed {
                exit_code, output, ..
            }) if !output.trim().is_empty() => {
                warn!(scenario_id = id, exit_code, "partial workspace listing");
                output
            }
            Err(e) => return Err(e.into()),
        };

        let structure = build_tree(&parse_listing(&output), root, &self.config.denylist);
        debug!(scenario_id = id, nodes = structure.len(), "built workspace tree");

        Ok(DirectoryStructureResponse {
            scenario_id: scenario.scenario_id.clone(),
            path: root.to_string(),
            structure,
            message: "Directory structure retrieved successfully".to_string(),
        })
    }

    /// Scenario types this deployment knows about
    pub fn list_scenario_types(&self) -> &[ScenarioTypeInfo] {
        &self.catalog.types
    }

    /// Records owned by `user_id`, oldest first
    ///
    /// # Errors
    /// - `InvalidInput` for a blank user ID
    /// - `Storage` on store failure
    pub async fn list_scenarios(&self, user_id: &str) -> ScenarioResult<Vec<Scenario>> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ScenarioError::invalid("user ID cannot be empty"));
        }
        Ok(self.store.list_by_user(user_id).await?)
    }

    async fn load(&self, scenario_id: &str) -> ScenarioResult<Scenario> {
        let id = scenario_id.trim();
        if id.is_empty() {
            return Err(ScenarioError::invalid("scenario ID cannot be empty"));
        }
        self.store
            .find(&ScenarioId::new(id))
            .await?
            .ok_or_else(|| ScenarioError::NotFound(id.to_string()))
    }

    /// Bound a runtime call by the configured deadline
    async fn call<T, F>(&self, fut: F) -> RuntimeResult<T>
    where
        F: Future<Output = RuntimeResult<T>>,
    {
        let limit = self.config.runtime_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(RuntimeError::Timeout(limit)))
    }

    async fn rollback(&self, container_id: &str) {
        match self.call(self.runtime.stop_and_remove(container_id)).await {
            Ok(_) => info!(container_id, "rolled back container"),
            Err(e) => error!(container_id, error = %e, "rollback failed, container left behind"),
        }
    }
}

fn status_response(
    scenario: &Scenario,
    container_status: Option<String>,
    message: &str,
) -> ScenarioStatusResponse {
    ScenarioStatusResponse {
        scenario_id: scenario.scenario_id.clone(),
        user_id: scenario.user_id.clone(),
        scenario_type: scenario.scenario_type.clone(),
        container_id: scenario.container_id.clone(),
        status: scenario.status,
        container_status,
        message: message.to_string(),
    }
}

/// Removes a freshly created container unless disarmed
///
/// Covers the window between `create_and_start` returning and the record
/// committing, including the caller dropping the future. A blocking store
/// may still commit the insert after the future is gone, so the spawned
/// rollback first looks for the record and keeps the container if it exists.
struct RollbackGuard<R, S>
where
    R: ContainerRuntime + ?Sized + 'static,
    S: ScenarioStore + ?Sized + 'static,
{
    runtime: Arc<R>,
    store: Arc<S>,
    scenario_id: ScenarioId,
    container_id: Option<String>,
}

impl<R, S> RollbackGuard<R, S>
where
    R: ContainerRuntime + ?Sized + 'static,
    S: ScenarioStore + ?Sized + 'static,
{
    fn new(runtime: Arc<R>, store: Arc<S>, scenario_id: &ScenarioId, container_id: &str) -> Self {
        Self {
            runtime,
            store,
            scenario_id: scenario_id.clone(),
            container_id: Some(container_id.to_string()),
        }
    }

    fn disarm(&mut self) {
        self.container_id = None;
    }
}

impl<R, S> Drop for RollbackGuard<R, S>
where
    R: ContainerRuntime + ?Sized + 'static,
    S: ScenarioStore + ?Sized + 'static,
{
    fn drop(&mut self) {
        let Some(container_id) = self.container_id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(container_id = %container_id, "start cancelled, rolling back container");
                let runtime = Arc::clone(&self.runtime);
                let store = Arc::clone(&self.store);
                let scenario_id = self.scenario_id.clone();
                handle.spawn(async move {
                    match store.find(&scenario_id).await {
                        Ok(Some(_)) => {
                            warn!(scenario_id = %scenario_id, container_id = %container_id, "record committed after cancellation, keeping container");
                            return;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(scenario_id = %scenario_id, error = %e, "could not check record before rollback");
                        }
                    }
                    if let Err(e) = runtime.stop_and_remove(&container_id).await {
                        error!(container_id = %container_id, error = %e, "rollback failed, container left behind");
                    }
                });
            }
            Err(_) => {
                error!(container_id = %container_id, "no async runtime to roll back container");
            }
        }
    }
}
