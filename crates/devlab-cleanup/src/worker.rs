//! Periodic reconciliation
//!
//! Each cycle runs two independent passes:
//! 1. Expired scenarios: live records older than `max_age` lose their
//!    container and end as `cleaned_up`.
//! 2. Orphans: managed containers no record references are removed.
//!
//! Both passes are best-effort. A failing item is logged and counted, and the
//! pass moves on. The worker shares the runtime and store with live manager
//! calls and takes no locks; "already gone" and "already updated" are normal.
//! Status writes are compare-and-set, so a record the manager moved in the
//! meantime keeps whatever status it reached.
//!
//! Every runtime call is bounded by `runtime_timeout` and abandoned as soon
//! as the shutdown token fires, so a hung engine can neither stall a cycle
//! forever nor hold up shutdown.

use crate::config::WorkerConfig;
use crate::report::{CycleReport, SweepReport};
use chrono::Utc;
use devlab_runtime::{ContainerRuntime, Removal, RuntimeError, RuntimeResult};
use devlab_store::{ScenarioFilter, ScenarioStore};
use devlab_types::{Scenario, ScenarioStatus};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cleanup / reconciliation worker
pub struct CleanupWorker<R: ?Sized, S: ?Sized> {
    runtime: Arc<R>,
    store: Arc<S>,
    config: WorkerConfig,
}

impl<R, S> CleanupWorker<R, S>
where
    R: ContainerRuntime + ?Sized,
    S: ScenarioStore + ?Sized,
{
    /// Create a worker over `runtime` and `store`
    pub fn new(runtime: Arc<R>, store: Arc<S>, config: WorkerConfig) -> Self {
        Self {
            runtime,
            store,
            config,
        }
    }

    /// Configuration
    #[inline]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run cycles every `interval` until `token` is cancelled
    ///
    /// The first cycle runs one interval after start. Cancellation abandons
    /// the runtime call in flight and returns.
    pub async fn run(&self, token: CancellationToken) {
        if !self.config.enabled {
            info!("cleanup worker disabled");
            return;
        }
        if self.config.interval.is_zero() {
            warn!("cleanup interval is zero, worker not started");
            return;
        }
        info!(
            interval = ?self.config.interval,
            max_age = ?self.config.max_age,
            runtime = self.runtime.name(),
            store = self.store.name(),
            "cleanup worker started"
        );

        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle(&token).await;
                }
            }
        }
        info!("cleanup worker stopped");
    }

    /// Run one full cycle now
    pub async fn run_once(&self) -> CycleReport {
        self.run_cycle(&CancellationToken::new()).await
    }

    async fn run_cycle(&self, token: &CancellationToken) -> CycleReport {
        debug!("cleanup cycle starting");
        let expired = self.sweep_expired(token).await;
        let orphans = if token.is_cancelled() {
            SweepReport::default()
        } else {
            self.sweep_orphans(token).await
        };
        let report = CycleReport {
            expired,
            orphans,
            interrupted: token.is_cancelled(),
        };

        info!(
            expired_examined = report.expired.examined,
            expired_cleaned = report.expired.cleaned,
            orphans_cleaned = report.orphans.cleaned,
            failed = report.failed(),
            interrupted = report.interrupted,
            "cleanup cycle complete"
        );
        report
    }

    /// Reclaim live scenarios older than `max_age`
    pub async fn sweep_expired(&self, token: &CancellationToken) -> SweepReport {
        let mut report = SweepReport::default();

        let Some(cutoff) = chrono::Duration::from_std(self.config.max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            warn!(max_age = ?self.config.max_age, "max age out of range, skipping expired sweep");
            return report;
        };

        let expired = match self.store.find_where(&ScenarioFilter::expired(cutoff)).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to query expired scenarios");
                report.failed += 1;
                return report;
            }
        };
        debug!(count = expired.len(), cutoff = %cutoff, "expired scenarios found");

        for scenario in expired {
            if token.is_cancelled() {
                debug!("expired sweep interrupted");
                break;
            }
            report.examined += 1;
            if self.reclaim(scenario, token).await {
                report.cleaned += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }

    /// Remove managed containers no record references
    pub async fn sweep_orphans(&self, token: &CancellationToken) -> SweepReport {
        let mut report = SweepReport::default();

        // list before reading the store so a record committed in between
        // protects its container
        let containers = match self.call(token, self.runtime.list()).await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(error = %e, "failed to list containers");
                report.failed += 1;
                return report;
            }
        };
        let referenced: HashSet<String> = match self
            .store
            .find_where(&ScenarioFilter::with_container())
            .await
        {
            Ok(records) => records.into_iter().map(|s| s.container_id).collect(),
            Err(e) => {
                warn!(error = %e, "failed to load referenced containers");
                report.failed += 1;
                return report;
            }
        };

        for container in containers {
            if token.is_cancelled() {
                debug!("orphan sweep interrupted");
                break;
            }
            report.examined += 1;
            if referenced.contains(&container.id) {
                continue;
            }

            info!(container_id = %container.id, name = %container.name, state = %container.state, "removing orphaned container");
            match self.call(token, self.runtime.stop_and_remove(&container.id)).await {
                Ok(_) => report.cleaned += 1,
                Err(e) => {
                    warn!(container_id = %container.id, error = %e, "failed to remove orphaned container");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Remove the container if present, then record `cleaned_up`
    ///
    /// The record is marked even when removal failed; the return value says
    /// whether everything succeeded. Shutdown during the runtime calls leaves
    /// the record for the next cycle.
    async fn reclaim(&self, scenario: Scenario, token: &CancellationToken) -> bool {
        let mut removed = true;
        if scenario.has_container() {
            let container_id = scenario.container_id.as_str();
            match self.call(token, self.runtime.exists(container_id)).await {
                Ok(true) => match self.call(token, self.runtime.stop_and_remove(container_id)).await {
                    Ok(Removal::Removed) => {
                        debug!(scenario_id = %scenario.scenario_id, container_id, "expired container removed");
                    }
                    Ok(Removal::AlreadyGone) => {}
                    Err(e) => {
                        warn!(scenario_id = %scenario.scenario_id, container_id, error = %e, "failed to remove expired container");
                        removed = false;
                    }
                },
                Ok(false) => {
                    debug!(scenario_id = %scenario.scenario_id, container_id, "expired container already gone");
                }
                Err(e) => {
                    warn!(scenario_id = %scenario.scenario_id, container_id, error = %e, "failed to check expired container");
                    removed = false;
                }
            }
        }

        if token.is_cancelled() {
            debug!(scenario_id = %scenario.scenario_id, "reclaim interrupted");
            return false;
        }

        let scenario_id = scenario.scenario_id.clone();
        match self
            .store
            .advance(scenario, ScenarioStatus::CleanedUp, Utc::now())
            .await
        {
            Ok(advanced) if advanced.written => {
                info!(scenario_id = %scenario_id, "scenario cleaned up");
            }
            Ok(advanced) => {
                debug!(scenario_id = %scenario_id, stored = %advanced.record.status, "scenario settled concurrently");
            }
            Err(e) => {
                warn!(scenario_id = %scenario_id, error = %e, "failed to mark scenario cleaned up");
                return false;
            }
        }
        removed
    }

    /// Bound a runtime call by the deadline and the shutdown token
    async fn call<T, F>(&self, token: &CancellationToken, fut: F) -> RuntimeResult<T>
    where
        F: Future<Output = RuntimeResult<T>>,
    {
        let limit = self.config.runtime_timeout;
        tokio::select! {
            biased;
            () = token.cancelled() => Err(RuntimeError::Cancelled),
            res = tokio::time::timeout(limit, fut) => res.unwrap_or(Err(RuntimeError::Timeout(limit))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use devlab_runtime::{InMemoryRuntime, ProvisionRequest, RuntimeOp};
    use devlab_store::MemoryScenarioStore;
    use devlab_types::ScenarioId;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Fixture {
        runtime: Arc<InMemoryRuntime>,
        store: Arc<MemoryScenarioStore>,
        worker: CleanupWorker<InMemoryRuntime, MemoryScenarioStore>,
    }

    fn fixture(config: WorkerConfig) -> Fixture {
        let runtime = Arc::new(InMemoryRuntime::new());
        let store = Arc::new(MemoryScenarioStore::new());
        let worker = CleanupWorker::new(runtime.clone(), store.clone(), config);
        Fixture {
            runtime,
            store,
            worker,
        }
    }

    async fn seed(fx: &Fixture, id: &str, status: ScenarioStatus, age_hours: i64) -> Scenario {
        let provisioned = fx
            .runtime
            .create_and_start(&ProvisionRequest::new("go"))
            .await
            .unwrap();
        let mut scenario = Scenario::new(
            ScenarioId::new(id),
            "alice",
            "go",
            provisioned.container_id,
            provisioned.host_port,
        )
        .created_at(Utc::now() - ChronoDuration::hours(age_hours));
        scenario.status = status;
        fx.store.insert(&scenario).await.unwrap();
        scenario
    }

    #[tokio::test]
    async fn expired_running_scenario_is_cleaned_up() {
        let fx = fixture(WorkerConfig::default());
        let old = seed(&fx, "scn-old", ScenarioStatus::Running, 25).await;

        let report = fx.worker.run_once().await;
        assert_eq!(
            report.expired,
            SweepReport {
                examined: 1,
                cleaned: 1,
                failed: 0
            }
        );
        assert_eq!(fx.store.get("scn-old").unwrap().status, ScenarioStatus::CleanedUp);
        assert!(!fx.runtime.contains(&old.container_id));
    }

    #[tokio::test]
    async fn fresh_and_stopped_scenarios_are_left_alone() {
        let fx = fixture(WorkerConfig::default());
        let fresh = seed(&fx, "scn-fresh", ScenarioStatus::Running, 1).await;
        let stopped = seed(&fx, "scn-stopped", ScenarioStatus::Stopped, 48).await;

        let report = fx.worker.run_once().await;
        assert_eq!(report.expired.examined, 0);
        assert_eq!(report.orphans.cleaned, 0);
        assert_eq!(fx.store.get("scn-fresh").unwrap().status, ScenarioStatus::Running);
        assert_eq!(fx.store.get("scn-stopped").unwrap().status, ScenarioStatus::Stopped);
        assert!(fx.runtime.contains(&fresh.container_id));
        assert!(fx.runtime.contains(&stopped.container_id));
    }

    #[tokio::test]
    async fn vanished_container_still_marks_cleaned_up() {
        let fx = fixture(WorkerConfig::default());
        let old = seed(&fx, "scn-old", ScenarioStatus::Provisioning, 30).await;
        fx.runtime.vanish(&old.container_id);

        let report = fx.worker.run_once().await;
        assert_eq!(report.expired.cleaned, 1);
        assert_eq!(fx.store.get("scn-old").unwrap().status, ScenarioStatus::CleanedUp);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_sweep() {
        let fx = fixture(WorkerConfig::default());
        seed(&fx, "scn-a", ScenarioStatus::Running, 30).await;
        let b = seed(&fx, "scn-b", ScenarioStatus::Running, 26).await;
        fx.runtime
            .fail_next(RuntimeOp::Remove, RuntimeError::engine("remove", "device busy"));

        let report = fx.worker.run_once().await;
        assert_eq!(report.expired.examined, 2);
        assert_eq!(report.expired.failed, 1);
        assert_eq!(report.expired.cleaned, 1);
        assert_eq!(fx.store.get("scn-a").unwrap().status, ScenarioStatus::CleanedUp);
        assert_eq!(fx.store.get("scn-b").unwrap().status, ScenarioStatus::CleanedUp);
        assert!(!fx.runtime.contains(&b.container_id));
    }

    #[tokio::test]
    async fn orphans_are_removed_and_referenced_kept() {
        let fx = fixture(WorkerConfig::default());
        let kept = seed(&fx, "scn-kept", ScenarioStatus::Running, 1).await;
        let orphan = fx.runtime.inject_orphan("stray");
        let foreign = fx.runtime.inject_foreign("postgres");

        let report = fx.worker.run_once().await;
        assert_eq!(
            report.orphans,
            SweepReport {
                examined: 2,
                cleaned: 1,
                failed: 0
            }
        );
        assert!(fx.runtime.contains(&kept.container_id));
        assert!(!fx.runtime.contains(&orphan));
        assert!(fx.runtime.contains(&foreign));
    }

    #[tokio::test]
    async fn cleaned_up_records_still_protect_their_container() {
        let fx = fixture(WorkerConfig::default());
        let done = seed(&fx, "scn-done", ScenarioStatus::CleanedUp, 1).await;

        fx.worker.run_once().await;
        assert!(fx.runtime.contains(&done.container_id));
    }

    #[tokio::test]
    async fn unreachable_runtime_is_reported_not_fatal() {
        let fx = fixture(WorkerConfig::default());
        seed(&fx, "scn-old", ScenarioStatus::Running, 30).await;
        fx.runtime.set_unavailable(true);

        let report = fx.worker.run_once().await;
        assert_eq!(report.expired.failed, 1);
        assert_eq!(report.orphans.failed, 1);
        assert_eq!(fx.store.get("scn-old").unwrap().status, ScenarioStatus::CleanedUp);
    }

    #[tokio::test]
    async fn cancelled_token_skips_remaining_items() {
        let fx = fixture(WorkerConfig::default());
        seed(&fx, "scn-a", ScenarioStatus::Running, 30).await;
        let token = CancellationToken::new();
        token.cancel();

        let report = fx.worker.sweep_expired(&token).await;
        assert_eq!(report.examined, 0);
        assert_eq!(fx.store.get("scn-a").unwrap().status, ScenarioStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn run_cycles_on_interval() {
        let fx = fixture(WorkerConfig::default().with_interval(Duration::from_secs(60)));
        let old = seed(&fx, "scn-old", ScenarioStatus::Running, 30).await;
        let worker = Arc::new(fx.worker);
        let token = CancellationToken::new();

        let handle = tokio::spawn({
            let worker = worker.clone();
            let token = token.clone();
            async move { worker.run(token).await }
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(fx.runtime.contains(&old.container_id));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!fx.runtime.contains(&old.container_id));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn disabled_worker_returns_immediately() {
        let fx = fixture(WorkerConfig::default().with_enabled(false));
        tokio::time::timeout(Duration::from_secs(1), fx.worker.run(CancellationToken::new()))
            .await
            .expect("disabled worker kept running");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_runtime_does_not_block_shutdown() {
        let fx = fixture(WorkerConfig::default().with_interval(Duration::from_secs(60)));
        seed(&fx, "scn-old", ScenarioStatus::Running, 30).await;
        fx.runtime.set_latency(Some(Duration::from_secs(3600)));
        let worker = Arc::new(fx.worker);
        let token = CancellationToken::new();

        let handle = tokio::spawn({
            let worker = worker.clone();
            let token = token.clone();
            async move { worker.run(token).await }
        });

        // first cycle is now stuck inside a runtime call
        tokio::time::sleep(Duration::from_secs(61)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop while a runtime call hung")
            .unwrap();
        assert_eq!(fx.store.get("scn-old").unwrap().status, ScenarioStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runtime_calls_count_as_failures() {
        let fx = fixture(
            WorkerConfig::default().with_runtime_timeout(Duration::from_secs(5)),
        );
        let old = seed(&fx, "scn-old", ScenarioStatus::Running, 30).await;
        fx.runtime.set_latency(Some(Duration::from_secs(600)));

        let report = fx.worker.run_once().await;
        assert_eq!(report.expired.failed, 1);
        assert_eq!(report.orphans.failed, 1);
        assert!(!report.interrupted);
        assert_eq!(fx.store.get("scn-old").unwrap().status, ScenarioStatus::CleanedUp);
        assert!(fx.runtime.contains(&old.container_id));
    }

    #[tokio::test]
    async fn zero_interval_does_not_start() {
        let fx = fixture(WorkerConfig::default().with_interval(Duration::ZERO));
        tokio::time::timeout(Duration::from_secs(1), fx.worker.run(CancellationToken::new()))
            .await
            .expect("worker with zero interval kept running");
    }
}
