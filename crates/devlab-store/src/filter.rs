//! Record filters

use chrono::{DateTime, Utc};
use devlab_types::{Scenario, ScenarioStatus};

/// Conjunction of optional predicates over scenario records
///
/// An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    /// Status must be one of these (empty: any)
    pub statuses: Vec<ScenarioStatus>,
    /// `created_at` strictly before this instant
    pub created_before: Option<DateTime<Utc>>,
    /// Require a non-empty `container_id`
    pub container_id_present: bool,
    /// Owner must match
    pub user_id: Option<String>,
}

impl ScenarioFilter {
    /// Filter matching everything
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records still holding a live resource and older than `cutoff`
    #[must_use]
    pub fn expired(cutoff: DateTime<Utc>) -> Self {
        Self::new()
            .with_statuses([ScenarioStatus::Provisioning, ScenarioStatus::Running])
            .with_created_before(cutoff)
    }

    /// Records referencing a runtime resource
    #[must_use]
    pub fn with_container() -> Self {
        Self {
            container_id_present: true,
            ..Self::default()
        }
    }

    /// Records owned by `user_id`
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// With allowed statuses
    #[inline]
    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = ScenarioStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// With creation cutoff
    #[inline]
    #[must_use]
    pub fn with_created_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_before = Some(cutoff);
        self
    }

    /// Whether `scenario` satisfies every predicate
    #[must_use]
    pub fn matches(&self, scenario: &Scenario) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&scenario.status) {
            return false;
        }
        if let Some(cutoff) = self.created_before {
            if scenario.created_at >= cutoff {
                return false;
            }
        }
        if self.container_id_present && !scenario.has_container() {
            return false;
        }
        if let Some(user) = &self.user_id {
            if &scenario.user_id != user {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use devlab_types::ScenarioId;

    fn scenario(status: ScenarioStatus, age_hours: i64) -> Scenario {
        let mut s = Scenario::new(ScenarioId::new("scn-1"), "alice", "go", "c1", 3001)
            .created_at(Utc::now() - Duration::hours(age_hours));
        s.status = status;
        s
    }

    #[test]
    fn empty_filter_matches_all() {
        assert!(ScenarioFilter::new().matches(&scenario(ScenarioStatus::CleanedUp, 0)));
    }

    #[test]
    fn expired_filter_selects_old_live_records() {
        let filter = ScenarioFilter::expired(Utc::now() - Duration::hours(24));
        assert!(filter.matches(&scenario(ScenarioStatus::Running, 25)));
        assert!(filter.matches(&scenario(ScenarioStatus::Provisioning, 30)));
        assert!(!filter.matches(&scenario(ScenarioStatus::Running, 1)));
        assert!(!filter.matches(&scenario(ScenarioStatus::Stopped, 48)));
    }

    #[test]
    fn container_filter_skips_blank_ids() {
        let mut s = scenario(ScenarioStatus::Running, 0);
        assert!(ScenarioFilter::with_container().matches(&s));
        s.container_id = String::new();
        assert!(!ScenarioFilter::with_container().matches(&s));
    }

    #[test]
    fn user_filter() {
        let s = scenario(ScenarioStatus::Running, 0);
        assert!(ScenarioFilter::for_user("alice").matches(&s));
        assert!(!ScenarioFilter::for_user("bob").matches(&s));
    }
}
