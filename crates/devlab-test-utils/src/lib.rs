//! Testing utilities for DevLab workspace
//!
//! A manager and a worker wired over shared in-memory backends, plus
//! builders for records that would take hours to age naturally.

#![allow(missing_docs)]

use chrono::{Duration, Utc};
use devlab_cleanup::{CleanupWorker, WorkerConfig};
use devlab_core::{ManagerConfig, ScenarioManager};
use devlab_runtime::{ContainerRuntime, InMemoryRuntime, ProvisionRequest, RuntimeConfig};
use devlab_store::{MemoryScenarioStore, ScenarioStore};
use devlab_types::{Scenario, ScenarioId, ScenarioStatus};
use std::sync::Arc;

pub type TestManager = ScenarioManager<InMemoryRuntime, MemoryScenarioStore>;
pub type TestWorker = CleanupWorker<InMemoryRuntime, MemoryScenarioStore>;

pub struct TestHarness {
    pub runtime: Arc<InMemoryRuntime>,
    pub store: Arc<MemoryScenarioStore>,
    pub manager: TestManager,
    pub worker: TestWorker,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_configs(
            RuntimeConfig::default(),
            ManagerConfig::default(),
            WorkerConfig::default(),
        )
    }

    pub fn with_configs(runtime: RuntimeConfig, manager: ManagerConfig, worker: WorkerConfig) -> Self {
        let runtime = Arc::new(InMemoryRuntime::with_config(&runtime));
        let store = Arc::new(MemoryScenarioStore::new());
        Self {
            manager: ScenarioManager::new(runtime.clone(), store.clone(), manager),
            worker: CleanupWorker::new(runtime.clone(), store.clone(), worker),
            runtime,
            store,
        }
    }

    /// Start a scenario through the manager and return its record
    pub async fn start(&self, user_id: &str, scenario_type: &str) -> Scenario {
        let resp = self
            .manager
            .start_scenario(user_id, scenario_type, None)
            .await
            .unwrap();
        self.record(resp.scenario_id.as_str())
    }

    /// Start a scenario and reconcile it to `running`
    pub async fn start_running(&self, user_id: &str) -> Scenario {
        let scenario = self.start(user_id, "go").await;
        let status = self
            .manager
            .get_scenario_status(scenario.scenario_id.as_str())
            .await
            .unwrap();
        assert_eq!(status.status, ScenarioStatus::Running);
        self.record(scenario.scenario_id.as_str())
    }

    pub fn record(&self, scenario_id: &str) -> Scenario {
        self.store.get(scenario_id).unwrap()
    }

    pub fn status_of(&self, scenario_id: &str) -> ScenarioStatus {
        self.record(scenario_id).status
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for records seeded directly into the store
pub struct ScenarioFixture {
    id: String,
    user_id: String,
    scenario_type: String,
    status: ScenarioStatus,
    age: Duration,
    with_container: bool,
}

impl ScenarioFixture {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            user_id: "alice".to_string(),
            scenario_type: "go".to_string(),
            status: ScenarioStatus::Running,
            age: Duration::zero(),
            with_container: true,
        }
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    pub fn status(mut self, status: ScenarioStatus) -> Self {
        self.status = status;
        self
    }

    pub fn aged_hours(mut self, hours: i64) -> Self {
        self.age = Duration::hours(hours);
        self
    }

    pub fn without_container(mut self) -> Self {
        self.with_container = false;
        self
    }

    /// Provision a backing container (unless disabled) and insert the record
    pub async fn seed(self, harness: &TestHarness) -> Scenario {
        let (container_id, port) = if self.with_container {
            let provisioned = harness
                .runtime
                .create_and_start(&ProvisionRequest::new(self.scenario_type.as_str()))
                .await
                .unwrap();
            (provisioned.container_id, provisioned.host_port)
        } else {
            (String::new(), 0)
        };

        let mut scenario = Scenario::new(
            ScenarioId::new(self.id),
            self.user_id,
            self.scenario_type,
            container_id,
            port,
        )
        .created_at(Utc::now() - self.age);
        scenario.status = self.status;
        harness.store.insert(&scenario).await.unwrap();
        scenario
    }
}
