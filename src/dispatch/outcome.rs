//! Per-plugin dispatch result stored in the execution report.

use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;

/// Terminal state of one plugin within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The adapter returned an output.
    Succeeded,
    /// Dispatch failed (no adapter, unavailable, timeout, adapter error).
    Failed,
    /// Never dispatched because a dependency did not succeed.
    Skipped,
    /// Never dispatched because the run was cancelled.
    Canceled,
}

/// Result of dispatching (or not dispatching) one plugin.
#[derive(Clone, Debug, Serialize)]
pub struct DispatchOutcome {
    pub plugin: String,
    pub status: OutcomeStatus,
    /// Adapter output on success.
    pub output: Option<Value>,
    pub warnings: Vec<String>,
    /// Wall time spent in dispatch; 0 if never dispatched.
    pub elapsed_ms: u64,
    pub error: Option<DispatchError>,
    pub started_at: Option<SystemTime>,
}

impl DispatchOutcome {
    pub(crate) fn succeeded(
        plugin: &str,
        output: Value,
        warnings: Vec<String>,
        elapsed_ms: u64,
        started_at: SystemTime,
    ) -> Self {
        Self {
            plugin: plugin.to_owned(),
            status: OutcomeStatus::Succeeded,
            output: Some(output),
            warnings,
            elapsed_ms,
            error: None,
            started_at: Some(started_at),
        }
    }

    pub(crate) fn failed(error: DispatchError, elapsed_ms: u64, started_at: Option<SystemTime>) -> Self {
        Self {
            plugin: error.plugin().to_owned(),
            status: OutcomeStatus::Failed,
            output: None,
            warnings: Vec::new(),
            elapsed_ms,
            error: Some(error),
            started_at,
        }
    }

    /// Outcome for a plugin that was never dispatched.
    pub(crate) fn not_dispatched(error: DispatchError) -> Self {
        let status = match error {
            DispatchError::Canceled { .. } => OutcomeStatus::Canceled,
            _ => OutcomeStatus::Skipped,
        };
        Self {
            status,
            ..Self::failed(error, 0, None)
        }
    }

    /// True if the adapter produced an output.
    pub fn ok(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }

    /// True for a success that carries warnings.
    pub fn is_warning(&self) -> bool {
        self.ok() && !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_dispatched_maps_to_skipped_or_canceled() {
        let skipped = DispatchOutcome::not_dispatched(DispatchError::DependencyFailed {
            plugin: "c".into(),
            dependency: "b".into(),
        });
        assert_eq!(skipped.status, OutcomeStatus::Skipped);
        assert_eq!(skipped.plugin, "c");
        assert!(!skipped.ok());

        let canceled = DispatchOutcome::not_dispatched(DispatchError::Canceled { plugin: "d".into() });
        assert_eq!(canceled.status, OutcomeStatus::Canceled);
        assert_eq!(canceled.elapsed_ms, 0);
    }

    #[test]
    fn warnings_only_count_on_success() {
        let ok = DispatchOutcome::succeeded(
            "a",
            Value::Null,
            vec!["stale cache".into()],
            3,
            SystemTime::UNIX_EPOCH,
        );
        assert!(ok.ok() && ok.is_warning());

        let serialized = serde_json::to_value(&ok).unwrap();
        assert_eq!(serialized["status"], "succeeded");
    }
}
