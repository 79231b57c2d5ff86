//! Stored status vs live runtime state

use devlab_runtime::LiveStatus;
use devlab_types::ScenarioStatus;

/// Status a record should carry given what the runtime reports
///
/// - `provisioning` + running resource → `running`
/// - any status that may stop + halted resource → `stopped`
/// - otherwise the stored status stands
///
/// `cleaned_up` never changes here.
#[must_use]
pub fn reconcile(stored: ScenarioStatus, live: &LiveStatus) -> ScenarioStatus {
    let target = if live.is_running() && stored == ScenarioStatus::Provisioning {
        ScenarioStatus::Running
    } else if live.is_stopped() {
        ScenarioStatus::Stopped
    } else {
        return stored;
    };

    if stored.can_transition_to(target) {
        target
    } else {
        stored
    }
}

/// Status for a record whose resource no longer exists
#[must_use]
pub fn reconcile_missing(stored: ScenarioStatus) -> ScenarioStatus {
    if stored.can_transition_to(ScenarioStatus::Stopped) {
        ScenarioStatus::Stopped
    } else {
        stored
    }
}
