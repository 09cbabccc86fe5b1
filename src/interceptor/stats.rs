// SPDX-License-Identifier: Apache-2.0

//! Lock-free audit counters.

use std::sync::atomic::{AtomicU64, Ordering};

use qore_audit_core::{AuditError, CheckKind, CheckOutcome, InspectionReport};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct AuditStats {
    inspected: AtomicU64,
    field_violations: AtomicU64,
    index_violations: AtomicU64,
    notified: AtomicU64,
    suppressed: AtomicU64,
    failed: AtomicU64,
}

impl AuditStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_report(&self, report: &InspectionReport) {
        self.inspected.fetch_add(1, Ordering::Relaxed);
        self.record_outcome(CheckKind::Field, report.field);
        self.record_outcome(CheckKind::Index, report.index);
    }

    pub fn record_failure(&self, error: &AuditError) {
        self.inspected.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        let violations = match error {
            AuditError::InvalidField { .. } => &self.field_violations,
            AuditError::LowIndexCoverage { .. } => &self.index_violations,
        };
        violations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_outcome(&self, kind: CheckKind, outcome: CheckOutcome) {
        if !outcome.is_violation() {
            return;
        }

        let violations = match kind {
            CheckKind::Field => &self.field_violations,
            CheckKind::Index => &self.index_violations,
        };
        violations.fetch_add(1, Ordering::Relaxed);

        match outcome {
            CheckOutcome::Notified => {
                self.notified.fetch_add(1, Ordering::Relaxed);
            }
            CheckOutcome::Suppressed => {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
            }
            CheckOutcome::Passed | CheckOutcome::Ignored => {}
        }
    }

    pub fn snapshot(&self) -> AuditStatsSnapshot {
        AuditStatsSnapshot {
            inspected: self.inspected.load(Ordering::Relaxed),
            field_violations: self.field_violations.load(Ordering::Relaxed),
            index_violations: self.index_violations.load(Ordering::Relaxed),
            notified: self.notified.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.inspected,
            &self.field_violations,
            &self.index_violations,
            &self.notified,
            &self.suppressed,
            &self.failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditStatsSnapshot {
    pub inspected: u64,
    pub field_violations: u64,
    pub index_violations: u64,
    pub notified: u64,
    pub suppressed: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_outcomes_per_check() {
        let stats = AuditStats::new();
        stats.record_report(&InspectionReport {
            field: CheckOutcome::Notified,
            index: CheckOutcome::Suppressed,
        });
        stats.record_report(&InspectionReport {
            field: CheckOutcome::Passed,
            index: CheckOutcome::Ignored,
        });
        stats.record_failure(&AuditError::invalid_field("bad"));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.inspected, 3);
        assert_eq!(snapshot.field_violations, 2);
        assert_eq!(snapshot.index_violations, 2);
        assert_eq!(snapshot.notified, 1);
        assert_eq!(snapshot.suppressed, 1);
        assert_eq!(snapshot.failed, 1);

        stats.reset();
        assert_eq!(stats.snapshot().inspected, 0);
    }
}
