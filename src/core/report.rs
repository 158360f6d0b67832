//! # Execution report.
//!
//! [`ExecutionReport`] is the result of one run: one [`DispatchOutcome`] per
//! plugin (in execution-order position), a [`Summary`] and the advisory timeline.

use std::time::SystemTime;

use serde::Serialize;
use uuid::Uuid;

use crate::dispatch::{DispatchOutcome, OutcomeStatus};
use crate::schedule::ScheduleSlot;

/// Aggregated counts of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Successful outcomes (including those with warnings).
    pub ok_count: usize,
    /// Successful outcomes that carried warnings.
    pub warn_count: usize,
    pub fail_count: usize,
    /// Skipped-due-to-dependency-failure.
    pub skipped_count: usize,
    pub canceled_count: usize,
    pub started_at: SystemTime,
    pub completed_at: SystemTime,
}

impl Summary {
    pub(crate) fn from_outcomes(
        outcomes: &[DispatchOutcome],
        started_at: SystemTime,
        completed_at: SystemTime,
    ) -> Self {
        let mut s = Self {
            ok_count: 0,
            warn_count: 0,
            fail_count: 0,
            skipped_count: 0,
            canceled_count: 0,
            started_at,
            completed_at,
        };
        for o in outcomes {
            match o.status {
                OutcomeStatus::Succeeded => {
                    s.ok_count += 1;
                    if o.is_warning() {
                        s.warn_count += 1;
                    }
                }
                OutcomeStatus::Failed => s.fail_count += 1,
                OutcomeStatus::Skipped => s.skipped_count += 1,
                OutcomeStatus::Canceled => s.canceled_count += 1,
            }
        }
        s
    }
}

/// Complete result of a run.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    /// One outcome per plugin, in execution-order position.
    pub outcomes: Vec<DispatchOutcome>,
    pub summary: Summary,
    pub timeline: Vec<ScheduleSlot>,
}

impl ExecutionReport {
    /// No failures, skips or cancellations.
    pub fn is_healthy(&self) -> bool {
        self.summary.fail_count == 0
            && self.summary.skipped_count == 0
            && self.summary.canceled_count == 0
    }

    pub fn outcome(&self, plugin: &str) -> Option<&DispatchOutcome> {
        self.outcomes.iter().find(|o| o.plugin == plugin)
    }

    /// Outcomes that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &DispatchOutcome> {
        self.outcomes.iter().filter(|o| !o.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use serde_json::Value;
    use std::time::UNIX_EPOCH;

    #[test]
    fn summary_counts_warnings_as_ok_too() {
        let outcomes = vec![
            DispatchOutcome::succeeded("a", Value::Null, vec![], 1, UNIX_EPOCH),
            DispatchOutcome::succeeded("b", Value::Null, vec!["slow".into()], 1, UNIX_EPOCH),
            DispatchOutcome::failed(
                DispatchError::AdapterExecutionFailed {
                    plugin: "c".into(),
                    error: "boom".into(),
                },
                1,
                Some(UNIX_EPOCH),
            ),
            DispatchOutcome::not_dispatched(DispatchError::DependencyFailed {
                plugin: "d".into(),
                dependency: "c".into(),
            }),
        ];
        let summary = Summary::from_outcomes(&outcomes, UNIX_EPOCH, UNIX_EPOCH);
        assert_eq!(
            (summary.ok_count, summary.warn_count, summary.fail_count, summary.skipped_count),
            (2, 1, 1, 1)
        );

        let report = ExecutionReport {
            run_id: Uuid::nil(),
            outcomes,
            summary,
            timeline: vec![],
        };
        assert!(!report.is_healthy());
        assert_eq!(report.failures().count(), 2);
        assert!(report.outcome("b").is_some_and(DispatchOutcome::is_warning));
    }
}
