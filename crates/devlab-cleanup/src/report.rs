//! Sweep outcomes

use serde::Serialize;

/// Outcome of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Items looked at
    pub examined: usize,
    /// Items reclaimed
    pub cleaned: usize,
    /// Items that hit an error (logged)
    pub failed: usize,
}

impl SweepReport {
    /// Nothing went wrong
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Outcome of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Expired-scenario pass
    pub expired: SweepReport,
    /// Orphan pass
    pub orphans: SweepReport,
    /// Cycle stopped early on cancellation
    pub interrupted: bool,
}

impl CycleReport {
    /// Total items reclaimed
    #[inline]
    #[must_use]
    pub fn cleaned(&self) -> usize {
        self.expired.cleaned + self.orphans.cleaned
    }

    /// Total failures
    #[inline]
    #[must_use]
    pub fn failed(&self) -> usize {
        self.expired.failed + self.orphans.failed
    }
}
