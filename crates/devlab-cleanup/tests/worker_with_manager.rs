//! Worker sweeps racing live manager calls

use async_trait::async_trait;
use devlab_cleanup::WorkerConfig;
use devlab_core::{ManagerConfig, ScenarioManager};
use devlab_runtime::{RuntimeConfig, RuntimeError, RuntimeOp};
use devlab_store::{MemoryScenarioStore, ScenarioFilter, ScenarioStore, StoreResult};
use devlab_test_utils::{ScenarioFixture, TestHarness};
use devlab_types::{Scenario, ScenarioId, ScenarioStatus};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// Store whose first conditional write waits until released
struct GatedStore {
    inner: Arc<MemoryScenarioStore>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    entered: Notify,
}

impl GatedStore {
    fn new(inner: Arc<MemoryScenarioStore>) -> (Self, oneshot::Sender<()>) {
        let (release, gate) = oneshot::channel();
        let store = Self {
            inner,
            gate: Mutex::new(Some(gate)),
            entered: Notify::new(),
        };
        (store, release)
    }
}

#[async_trait]
impl ScenarioStore for GatedStore {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn insert(&self, scenario: &Scenario) -> StoreResult<()> {
        self.inner.insert(scenario).await
    }

    async fn find(&self, id: &ScenarioId) -> StoreResult<Option<Scenario>> {
        self.inner.find(id).await
    }

    async fn update(&self, scenario: &Scenario) -> StoreResult<()> {
        self.inner.update(scenario).await
    }

    async fn update_if(&self, scenario: &Scenario, expected: ScenarioStatus) -> StoreResult<bool> {
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            self.entered.notify_one();
            let _ = gate.await;
        }
        self.inner.update_if(scenario, expected).await
    }

    async fn find_where(&self, filter: &ScenarioFilter) -> StoreResult<Vec<Scenario>> {
        self.inner.find_where(filter).await
    }
}

#[tokio::test]
async fn expired_scenarios_are_reclaimed_fresh_ones_survive() {
    let h = TestHarness::new();
    let old = ScenarioFixture::new("scn-old").aged_hours(30).seed(&h).await;
    let young = ScenarioFixture::new("scn-young").aged_hours(2).seed(&h).await;
    let stopped = ScenarioFixture::new("scn-stopped")
        .status(ScenarioStatus::Stopped)
        .aged_hours(48)
        .without_container()
        .seed(&h)
        .await;

    let report = h.worker.run_once().await;
    assert_eq!(report.expired.cleaned, 1);
    assert_eq!(report.failed(), 0);

    assert_eq!(h.status_of("scn-old"), ScenarioStatus::CleanedUp);
    assert!(!h.runtime.contains(&old.container_id));
    assert_eq!(h.status_of("scn-young"), ScenarioStatus::Running);
    assert!(h.runtime.contains(&young.container_id));
    assert_eq!(h.status_of(stopped.scenario_id.as_str()), ScenarioStatus::Stopped);
}

#[tokio::test]
async fn manager_views_reclaimed_scenario_consistently() {
    let h = TestHarness::new();
    ScenarioFixture::new("scn-old").aged_hours(25).seed(&h).await;
    h.worker.run_once().await;

    let status = h.manager.get_scenario_status("scn-old").await.unwrap();
    assert_eq!(status.status, ScenarioStatus::CleanedUp);
    h.manager.stop_scenario("scn-old").await.unwrap();
    assert_eq!(h.status_of("scn-old"), ScenarioStatus::CleanedUp);
}

#[tokio::test]
async fn orphans_from_failed_rollback_are_swept() {
    let h = TestHarness::new();
    h.store.set_fail_writes(true);
    // the rollback's stop fails, so the container outlives the failed start
    h.runtime
        .fail_next(RuntimeOp::Stop, RuntimeError::engine("stop", "busy"));
    h.runtime
        .fail_next(RuntimeOp::Remove, RuntimeError::engine("remove", "busy"));
    assert!(h.manager.start_scenario("alice", "go", None).await.is_err());
    assert_eq!(h.runtime.len(), 1);
    h.store.set_fail_writes(false);

    let kept = h.start("bob", "go").await;
    h.runtime.inject_foreign("someone-elses");

    let report = h.worker.run_once().await;
    assert_eq!(report.orphans.cleaned, 1);
    assert_eq!(h.runtime.ids().len(), 2);
    assert!(h.runtime.contains(&kept.container_id));
    assert!(h.runtime.contains("someone-elses"));
}

#[tokio::test]
async fn sweep_and_stop_racing_on_same_scenario_both_succeed() {
    let h = TestHarness::new();
    let record = ScenarioFixture::new("scn-race").aged_hours(48).seed(&h).await;

    let (report, stopped) = tokio::join!(h.worker.run_once(), h.manager.stop_scenario("scn-race"));
    stopped.unwrap();
    assert_eq!(report.failed(), 0);
    assert!(!h.runtime.contains(&record.container_id));

    // whichever write landed last, the record is at rest
    let status = h.status_of("scn-race");
    assert!(matches!(status, ScenarioStatus::Stopped | ScenarioStatus::CleanedUp));
}

#[tokio::test]
async fn concurrent_status_calls_during_sweep() {
    let h = TestHarness::new();
    let live = h.start_running("alice").await;
    ScenarioFixture::new("scn-old").aged_hours(48).seed(&h).await;

    let id = live.scenario_id.as_str();
    let (report, a, b) = tokio::join!(
        h.worker.run_once(),
        h.manager.get_scenario_status(id),
        h.manager.get_scenario_status(id),
    );
    assert_eq!(report.expired.cleaned, 1);
    assert_eq!(a.unwrap().status, ScenarioStatus::Running);
    assert_eq!(b.unwrap().status, ScenarioStatus::Running);
    assert_eq!(h.status_of(id), ScenarioStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn background_worker_stops_on_cancel() {
    let h = TestHarness::with_configs(
        RuntimeConfig::default(),
        ManagerConfig::default(),
        WorkerConfig::default()
            .with_interval(Duration::from_secs(60))
            .with_max_age(Duration::from_secs(3600)),
    );
    ScenarioFixture::new("scn-old").aged_hours(2).seed(&h).await;

    let token = CancellationToken::new();
    let run = h.worker.run(token.clone());
    let drive = async {
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(h.status_of("scn-old"), ScenarioStatus::CleanedUp);
        token.cancel();
    };
    tokio::join!(run, drive);
}

#[tokio::test]
async fn status_write_losing_to_sweep_keeps_cleaned_up() {
    let h = TestHarness::new();
    let record = ScenarioFixture::new("scn-race")
        .status(ScenarioStatus::Provisioning)
        .aged_hours(48)
        .seed(&h)
        .await;

    let (gated, release) = GatedStore::new(h.store.clone());
    let gated = Arc::new(gated);
    let manager = ScenarioManager::new(h.runtime.clone(), gated.clone(), ManagerConfig::default());

    // the manager has seen the container running and is about to write `running`
    // when the sweep reclaims the scenario
    let worker = &h.worker;
    let entered = &gated.entered;
    let sweep = async move {
        entered.notified().await;
        let report = worker.run_once().await;
        release.send(()).unwrap();
        report
    };
    let (status, report) = tokio::join!(manager.get_scenario_status("scn-race"), sweep);

    assert_eq!(report.expired.cleaned, 1);
    let status = status.unwrap();
    assert_eq!(status.status, ScenarioStatus::CleanedUp);
    assert_eq!(status.container_status.as_deref(), Some("running"));
    assert_eq!(h.status_of("scn-race"), ScenarioStatus::CleanedUp);
    assert!(!h.runtime.contains(&record.container_id));
}
