//! Error types used by the plugvisor kernel.
//!
//! The taxonomy follows the kernel's three phases:
//!
//! - [`ResolveError`]: catalog and resolution failures (fatal to the resolution call).
//! - [`DispatchError`]: failures of one plugin inside a run (captured in the report).
//! - [`DeliveryError`]: delivery queue failures (never re-raised to publishers).
//!
//! Collaborators report failures with [`AdapterError`] and [`HandlerError`];
//! teardown failures are [`ReleaseError`]s aggregated into a [`ScopeError`].
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::ExecutionReport;

/// # Errors produced while registering plugins or resolving an execution order.
///
/// Resolution is all-or-nothing: any of these aborts the whole call and no
/// partial order is returned.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A plugin with this name is already registered.
    #[error("plugin '{name}' is already registered")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// The dependency graph contains a loop.
    #[error("dependency cycle detected at '{plugin}': {}", cycle.join(" -> "))]
    CycleDetected {
        /// Plugin at which the traversal re-entered the loop.
        plugin: String,
        /// Members of the loop in traversal order, starting at `plugin`.
        cycle: Vec<String>,
    },

    /// A plugin depends on a name that is not registered.
    #[error("plugin '{from}' depends on unknown plugin '{to}'")]
    MissingDependency {
        /// The dependent plugin.
        from: String,
        /// The missing dependency name.
        to: String,
    },
}

impl ResolveError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use plugvisor::ResolveError;
    ///
    /// let err = ResolveError::DuplicateName { name: "a".into() };
    /// assert_eq!(err.as_label(), "resolve_duplicate_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ResolveError::DuplicateName { .. } => "resolve_duplicate_name",
            ResolveError::CycleDetected { .. } => "resolve_cycle_detected",
            ResolveError::MissingDependency { .. } => "resolve_missing_dependency",
        }
    }
}

/// # Errors produced while dispatching a single plugin.
///
/// These are fatal to one plugin only. They are stored in the
/// [`DispatchOutcome`](crate::DispatchOutcome) of the plugin instead of being
/// returned from the run, so sibling branches keep going.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchError {
    /// No adapter is registered under the plugin's adapter id.
    #[error("no adapter '{adapter}' for plugin '{plugin}'")]
    NoAdapter { plugin: String, adapter: String },

    /// The adapter reported itself unavailable for this run.
    #[error("adapter '{adapter}' unavailable for plugin '{plugin}'")]
    AdapterUnavailable { plugin: String, adapter: String },

    /// The adapter call exceeded the per-run timeout.
    #[error("plugin '{plugin}' timed out after {timeout:?}")]
    AdapterTimeout { plugin: String, timeout: Duration },

    /// The adapter returned an error.
    #[error("plugin '{plugin}' failed: {error}")]
    AdapterExecutionFailed { plugin: String, error: String },

    /// Skipped-due-to-dependency-failure: a dependency did not succeed.
    #[error("plugin '{plugin}' skipped: dependency '{dependency}' did not succeed")]
    DependencyFailed { plugin: String, dependency: String },

    /// The run was cancelled before the plugin could be dispatched.
    #[error("plugin '{plugin}' not dispatched: run cancelled")]
    Canceled { plugin: String },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::NoAdapter { .. } => "dispatch_no_adapter",
            DispatchError::AdapterUnavailable { .. } => "dispatch_adapter_unavailable",
            DispatchError::AdapterTimeout { .. } => "dispatch_adapter_timeout",
            DispatchError::AdapterExecutionFailed { .. } => "dispatch_adapter_failed",
            DispatchError::DependencyFailed { .. } => "dispatch_dependency_failed",
            DispatchError::Canceled { .. } => "dispatch_canceled",
        }
    }

    /// Name of the plugin this error belongs to.
    pub fn plugin(&self) -> &str {
        match self {
            DispatchError::NoAdapter { plugin, .. }
            | DispatchError::AdapterUnavailable { plugin, .. }
            | DispatchError::AdapterTimeout { plugin, .. }
            | DispatchError::AdapterExecutionFailed { plugin, .. }
            | DispatchError::DependencyFailed { plugin, .. }
            | DispatchError::Canceled { plugin } => plugin,
        }
    }

    /// True if the adapter was never invoked for this plugin.
    ///
    /// # Example
    /// ```
    /// use plugvisor::DispatchError;
    ///
    /// let skipped = DispatchError::DependencyFailed { plugin: "c".into(), dependency: "b".into() };
    /// assert!(skipped.is_not_dispatched());
    ///
    /// let failed = DispatchError::AdapterExecutionFailed { plugin: "b".into(), error: "boom".into() };
    /// assert!(!failed.is_not_dispatched());
    /// ```
    pub fn is_not_dispatched(&self) -> bool {
        matches!(
            self,
            DispatchError::DependencyFailed { .. } | DispatchError::Canceled { .. }
        )
    }
}

/// # Errors returned by [`Adapter::execute`](crate::Adapter::execute).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The adapter observed cancellation and stopped early.
    #[error("context cancelled")]
    Canceled,
}

impl AdapterError {
    /// Shorthand for [`AdapterError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        AdapterError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AdapterError::Fail { .. } => "adapter_failed",
            AdapterError::Canceled => "adapter_canceled",
        }
    }
}

/// # Error returned by a delivery [`Handler`](crate::Handler).
///
/// Any error schedules a retry for that handler (while the budget lasts).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler failed: {error}")]
pub struct HandlerError {
    /// The underlying error message.
    pub error: String,
}

impl HandlerError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// # Errors produced by the delivery queue.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Retry budget exhausted; the message was dead-lettered.
    ///
    /// Never returned to the publisher; it is logged, counted in
    /// `dead_lettered` and emitted as `MessageDeadLettered`.
    #[error("message {id} exhausted after {attempts} attempts")]
    DeliveryExhausted { id: Uuid, attempts: u32 },

    /// The queue was closed.
    #[error("delivery queue closed")]
    Closed,
}

impl DeliveryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::DeliveryExhausted { .. } => "delivery_exhausted",
            DeliveryError::Closed => "delivery_closed",
        }
    }
}

/// # Failure of one resource release during scope teardown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("release of '{resource}' failed: {error}")]
pub struct ReleaseError {
    /// Name of the resource that failed to release.
    pub resource: String,
    /// The underlying error message.
    pub error: String,
}

impl ReleaseError {
    pub fn new(resource: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            error: error.into(),
        }
    }
}

/// # Aggregated teardown failures.
///
/// Produced once, after every registered release has been attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} resource release(s) failed: {}", failures.len(), Self::names(failures))]
pub struct ScopeError {
    /// Failures in release order (most recently acquired first).
    pub failures: Vec<ReleaseError>,
}

impl ScopeError {
    fn names(failures: &[ReleaseError]) -> String {
        failures
            .iter()
            .map(|f| f.resource.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// # Errors returned by [`Orchestrator::run_plan`](crate::Orchestrator::run_plan).
///
/// Plugin failures are **not** run errors; they are reported per plugin in the
/// [`ExecutionReport`]. A run fails only when the plan itself is invalid (nothing
/// is dispatched) or when teardown could not release every resource.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError {
    /// The plan names a plugin that is not registered.
    #[error("plan references unknown plugin '{plugin}'")]
    UnknownPlugin { plugin: String },

    /// The plan lists a plugin before one of its dependencies (or omits it).
    #[error("plan lists '{plugin}' before its dependency '{dependency}'")]
    OrderViolation { plugin: String, dependency: String },

    /// The plan lists the same plugin twice.
    #[error("plan lists '{plugin}' more than once")]
    DuplicateInOrder { plugin: String },

    /// The run finished but teardown reported release failures.
    #[error("run {} finished but teardown failed: {source}", report.run_id)]
    Teardown {
        /// The complete report of the run.
        report: Box<ExecutionReport>,
        /// Aggregated release failures.
        #[source]
        source: ScopeError,
    },
}

impl RunError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::UnknownPlugin { .. } => "run_unknown_plugin",
            RunError::OrderViolation { .. } => "run_order_violation",
            RunError::DuplicateInOrder { .. } => "run_duplicate_in_order",
            RunError::Teardown { .. } => "run_teardown_failed",
        }
    }
}

impl From<ResolveError> for RunError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MissingDependency { to, .. } => RunError::UnknownPlugin { plugin: to },
            ResolveError::DuplicateName { name } => RunError::DuplicateInOrder { plugin: name },
            ResolveError::CycleDetected { plugin, mut cycle } => RunError::OrderViolation {
                dependency: cycle.pop().unwrap_or_else(|| plugin.clone()),
                plugin,
            },
        }
    }
}
