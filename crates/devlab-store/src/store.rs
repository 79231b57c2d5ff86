//! Metadata store contract

use crate::error::{StoreError, StoreResult};
use crate::filter::ScenarioFilter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devlab_types::{Scenario, ScenarioId, ScenarioStatus};

/// Record after [`ScenarioStore::advance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advanced {
    /// Record as stored once the call returns
    pub record: Scenario,
    /// This call wrote the transition
    pub written: bool,
}

/// Durable scenario records
///
/// Single-record reads and writes are atomic. Status changes go through
/// [`ScenarioStore::update_if`] so a writer holding a stale copy can never
/// overwrite a newer status.
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Persist a new record
    ///
    /// # Errors
    /// - `StoreError::Duplicate` if the ID is taken
    async fn insert(&self, scenario: &Scenario) -> StoreResult<()>;

    /// Record by ID
    async fn find(&self, id: &ScenarioId) -> StoreResult<Option<Scenario>>;

    /// Replace an existing record
    ///
    /// # Errors
    /// - `StoreError::NotFound` if no record has this ID
    async fn update(&self, scenario: &Scenario) -> StoreResult<()>;

    /// Replace a record only while its stored status is still `expected`
    ///
    /// Returns `false` and writes nothing when the stored status differs.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if no record has this ID
    async fn update_if(&self, scenario: &Scenario, expected: ScenarioStatus) -> StoreResult<bool>;

    /// Records matching `filter`, oldest first
    async fn find_where(&self, filter: &ScenarioFilter) -> StoreResult<Vec<Scenario>>;

    /// Records owned by `user_id`, oldest first
    async fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<Scenario>> {
        self.find_where(&ScenarioFilter::for_user(user_id)).await
    }

    /// Move `scenario` to `to` with compare-and-set writes
    ///
    /// When another writer changed the record first, it is re-read and the
    /// transition retried against the fresh status. Statuses only move
    /// forward, so the loop ends once the transition is written or no longer
    /// legal. Nothing is written when `scenario` already has status `to`.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the record disappeared
    /// - backend errors from `update_if` or `find`
    async fn advance(
        &self,
        mut scenario: Scenario,
        to: ScenarioStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Advanced> {
        loop {
            let expected = scenario.status;
            if !scenario.transition(to, at) {
                return Ok(Advanced {
                    record: scenario,
                    written: false,
                });
            }
            if self.update_if(&scenario, expected).await? {
                return Ok(Advanced {
                    record: scenario,
                    written: true,
                });
            }
            tracing::debug!(
                scenario_id = %scenario.scenario_id,
                expected = %expected,
                "record changed concurrently, re-reading"
            );
            scenario = self
                .find(&scenario.scenario_id)
                .await?
                .ok_or_else(|| StoreError::NotFound(scenario.scenario_id.to_string()))?;
        }
    }
}

/// Reject records no backend should accept
pub(crate) fn validate(scenario: &Scenario) -> StoreResult<()> {
    if scenario.scenario_id.is_blank() {
        return Err(StoreError::Invalid("scenario ID cannot be empty".to_string()));
    }
    Ok(())
}

/// Oldest first, ties broken by ID
pub(crate) fn sort_records(records: &mut [Scenario]) {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.scenario_id.as_str().cmp(b.scenario_id.as_str()))
    });
}
