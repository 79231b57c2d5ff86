//! In-memory store backed by a concurrent map

use crate::error::{StoreError, StoreResult};
use crate::filter::ScenarioFilter;
use crate::store::{sort_records, validate, ScenarioStore};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use devlab_types::{Scenario, ScenarioId, ScenarioStatus};
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local [`ScenarioStore`]
#[derive(Debug, Default)]
pub struct MemoryScenarioStore {
    records: DashMap<String, Scenario>,
    fail_writes: AtomicBool,
}

impl MemoryScenarioStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `insert`/`update` fail with a backend error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// No records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of one record
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Scenario> {
        self.records.get(id).map(|r| r.clone())
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ScenarioStore for MemoryScenarioStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, scenario: &Scenario) -> StoreResult<()> {
        validate(scenario)?;
        self.check_writable()?;
        match self.records.entry(scenario.scenario_id.as_str().to_string()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(scenario.scenario_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(scenario.clone());
                Ok(())
            }
        }
    }

    async fn find(&self, id: &ScenarioId) -> StoreResult<Option<Scenario>> {
        Ok(self.get(id.as_str()))
    }

    async fn update(&self, scenario: &Scenario) -> StoreResult<()> {
        validate(scenario)?;
        self.check_writable()?;
        match self.records.get_mut(scenario.scenario_id.as_str()) {
            Some(mut existing) => {
                *existing = scenario.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(scenario.scenario_id.to_string())),
        }
    }

    async fn update_if(&self, scenario: &Scenario, expected: ScenarioStatus) -> StoreResult<bool> {
        validate(scenario)?;
        self.check_writable()?;
        // the shard write lock is held across the check and the write
        match self.records.get_mut(scenario.scenario_id.as_str()) {
            Some(mut existing) if existing.status == expected => {
                *existing = scenario.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(scenario.scenario_id.to_string())),
        }
    }

    async fn find_where(&self, filter: &ScenarioFilter) -> StoreResult<Vec<Scenario>> {
        let mut out: Vec<Scenario> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        sort_records(&mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(id: &str) -> Scenario {
        Scenario::new(ScenarioId::new(id), "alice", "go", format!("c-{id}"), 3001)
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let store = MemoryScenarioStore::new();
        store.insert(&record("scn-1")).await.unwrap();
        let err = store.insert(&record("scn-1")).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate("scn-1".to_string()));
    }

    #[tokio::test]
    async fn insert_rejects_blank_id() {
        let store = MemoryScenarioStore::new();
        let err = store.insert(&record("  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let store = MemoryScenarioStore::new();
        let err = store.update(&record("scn-1")).await.unwrap_err();
        assert!(err.is_not_found());

        let mut s = record("scn-1");
        store.insert(&s).await.unwrap();
        assert!(s.transition(ScenarioStatus::Running, Utc::now()));
        store.update(&s).await.unwrap();
        let found = store.find(&s.scenario_id).await.unwrap().unwrap();
        assert_eq!(found.status, ScenarioStatus::Running);
    }

    #[tokio::test]
    async fn update_if_refuses_stale_status() {
        let store = MemoryScenarioStore::new();
        let mut current = record("scn-1");
        store.insert(&current).await.unwrap();
        assert!(current.transition(ScenarioStatus::CleanedUp, Utc::now()));
        store.update(&current).await.unwrap();

        let mut stale = record("scn-1");
        assert!(stale.transition(ScenarioStatus::Running, Utc::now()));
        let written = store
            .update_if(&stale, ScenarioStatus::Provisioning)
            .await
            .unwrap();
        assert!(!written);
        assert_eq!(store.get("scn-1").unwrap().status, ScenarioStatus::CleanedUp);

        let err = store
            .update_if(&record("scn-9"), ScenarioStatus::Provisioning)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn advance_retries_against_fresh_status() {
        let store = MemoryScenarioStore::new();
        let stale = record("scn-1");
        store.insert(&stale).await.unwrap();

        let mut running = stale.clone();
        assert!(running.transition(ScenarioStatus::Running, Utc::now()));
        store.update(&running).await.unwrap();

        // stale copy still says provisioning; stopping must still land
        let advanced = store
            .advance(stale.clone(), ScenarioStatus::Stopped, Utc::now())
            .await
            .unwrap();
        assert!(advanced.written);
        assert_eq!(store.get("scn-1").unwrap().status, ScenarioStatus::Stopped);

        // promoting to running is no longer legal once stopped
        let advanced = store
            .advance(stale, ScenarioStatus::Running, Utc::now())
            .await
            .unwrap();
        assert!(!advanced.written);
        assert_eq!(advanced.record.status, ScenarioStatus::Stopped);
    }

    #[tokio::test]
    async fn find_where_orders_oldest_first() {
        let store = MemoryScenarioStore::new();
        let now = Utc::now();
        store
            .insert(&record("scn-b").created_at(now - Duration::hours(1)))
            .await
            .unwrap();
        store
            .insert(&record("scn-a").created_at(now - Duration::hours(2)))
            .await
            .unwrap();

        let ids: Vec<String> = store
            .find_where(&ScenarioFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.scenario_id.to_string())
            .collect();
        assert_eq!(ids, vec!["scn-a", "scn-b"]);
    }

    #[tokio::test]
    async fn failing_writes_leave_store_untouched() {
        let store = MemoryScenarioStore::new();
        store.set_fail_writes(true);
        assert!(store.insert(&record("scn-1")).await.is_err());
        assert!(store.is_empty());
    }
}
