//! # Telemetry events emitted by the kernel.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Run events**: start/completion/cancellation of one plan run
//! - **Plugin events**: dispatch lifecycle of a single plugin
//! - **Delivery events**: delivery queue publish/retry/dead-letter
//! - **Runtime events**: scope teardown and sink health
//!
//! The [`Event`] struct carries correlation (run id, tenant, workspace) and
//! optional metadata depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order across sinks.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use plugvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::PluginCompleted)
//!     .with_plugin("score")
//!     .with_ok(false)
//!     .with_elapsed(Duration::from_millis(42))
//!     .with_reason("boom");
//!
//! assert_eq!(ev.plugin.as_deref(), Some("score"));
//! assert_eq!(ev.elapsed_ms, Some(42));
//! assert_eq!(ev.ok, Some(false));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of telemetry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Run events ===
    /// A plan run started.
    ///
    /// Sets: `run_id`, `tenant`, `workspace`, `plugin_count`
    RunStarted,

    /// A plan run finished (after every plugin has an outcome).
    ///
    /// Sets: `run_id`, `ok` (no failures, skips or cancellations), `elapsed_ms`
    RunCompleted,

    /// The run's cancellation token fired; nothing new will be dispatched.
    ///
    /// Sets: `run_id`
    RunCanceled,

    // === Plugin events ===
    /// An adapter call is about to start.
    ///
    /// Sets: `plugin`, `run_id`, `tenant`, `workspace`, `at`
    PluginStarted,

    /// An adapter call finished (success or failure). Always follows `PluginStarted`.
    ///
    /// Sets: `plugin`, `run_id`, `ok`, `elapsed_ms`, `reason` (on failure)
    PluginCompleted,

    /// The plugin exceeded the dispatch timeout. Published before its `PluginCompleted`.
    ///
    /// Sets: `plugin`, `run_id`, `timeout_ms`
    TimeoutHit,

    /// The plugin was never dispatched (dependency failure or cancellation).
    ///
    /// Sets: `plugin`, `run_id`, `reason`
    PluginSkipped,

    /// Free-form progress note published by an adapter through `Telemetry`.
    ///
    /// Sets: `plugin`, `run_id`, `reason`
    PluginProgress,

    // === Delivery events ===
    /// A message was accepted by the delivery queue.
    ///
    /// Sets: `message_id`
    MessagePublished,

    /// A handler failed for one delivery attempt.
    ///
    /// Sets: `message_id`, `attempt`, `reason`
    DeliveryFailed,

    /// A retry was scheduled for failed handlers.
    ///
    /// Sets: `message_id`, `attempt` (failed attempt), `delay_ms`
    RetryScheduled,

    /// Retry budget exhausted; the message was dropped.
    ///
    /// Sets: `message_id`, `attempt`, `reason`
    MessageDeadLettered,

    // === Runtime events ===
    /// A scope released one resource.
    ///
    /// Sets: `resource`
    ResourceReleased,

    /// A scope failed to release one resource (teardown continues).
    ///
    /// Sets: `resource`, `reason`
    ReleaseFailed,

    /// A telemetry sink panicked while handling an event.
    ///
    /// Sets: `resource` (sink name), `reason`
    SinkPanicked,

    /// A telemetry sink dropped an event (queue full or worker closed).
    ///
    /// Sets: `resource` (sink name), `reason`
    SinkOverflow,
}

/// Telemetry event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (from the kernel's [`Clock`](crate::Clock) when set by it)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Run correlation id.
    pub run_id: Option<Uuid>,
    /// Tenant correlation.
    pub tenant: Option<Arc<str>>,
    /// Workspace correlation.
    pub workspace: Option<Arc<str>>,

    /// Plugin name, if applicable.
    pub plugin: Option<Arc<str>>,
    /// Resource or sink name, if applicable.
    pub resource: Option<Arc<str>>,
    /// Delivery message id, if applicable.
    pub message_id: Option<Uuid>,

    /// Success flag (completion events).
    pub ok: Option<bool>,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: Option<u64>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay before next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Number of plugins in the plan (`RunStarted`).
    pub plugin_count: Option<u32>,
    /// Human-readable reason (errors, notes, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            run_id: None,
            tenant: None,
            workspace: None,
            plugin: None,
            resource: None,
            message_id: None,
            ok: None,
            elapsed_ms: None,
            timeout_ms: None,
            delay_ms: None,
            attempt: None,
            plugin_count: None,
            reason: None,
        }
    }

    /// Overrides the timestamp.
    #[inline]
    pub fn with_at(mut self, at: SystemTime) -> Self {
        self.at = at;
        self
    }

    /// Attaches run correlation.
    #[inline]
    pub fn with_run(
        mut self,
        run_id: Uuid,
        tenant: Option<Arc<str>>,
        workspace: Option<Arc<str>>,
    ) -> Self {
        self.run_id = Some(run_id);
        self.tenant = tenant;
        self.workspace = workspace;
        self
    }

    #[inline]
    pub fn with_plugin(mut self, plugin: impl Into<Arc<str>>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    #[inline]
    pub fn with_resource(mut self, resource: impl Into<Arc<str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[inline]
    pub fn with_message(mut self, id: Uuid) -> Self {
        self.message_id = Some(id);
        self
    }

    #[inline]
    pub fn with_ok(mut self, ok: bool) -> Self {
        self.ok = Some(ok);
        self
    }

    /// Attaches an elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches the plan size, saturating at `u32::MAX`.
    #[inline]
    pub fn with_plugin_count(mut self, n: usize) -> Self {
        self.plugin_count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a sink overflow event.
    #[inline]
    pub fn sink_overflow(sink: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SinkOverflow)
            .with_resource(sink)
            .with_reason(format!("sink={sink} reason={reason}"))
    }

    /// Creates a sink panic event.
    #[inline]
    pub fn sink_panicked(sink: &'static str, info: String) -> Self {
        Event::new(EventKind::SinkPanicked)
            .with_resource(sink)
            .with_reason(info)
    }

    /// True for events describing a failure of some kind.
    pub fn is_failure(&self) -> bool {
        match self.kind {
            EventKind::PluginCompleted | EventKind::RunCompleted => self.ok == Some(false),
            EventKind::TimeoutHit
            | EventKind::PluginSkipped
            | EventKind::DeliveryFailed
            | EventKind::MessageDeadLettered
            | EventKind::ReleaseFailed
            | EventKind::SinkPanicked
            | EventKind::SinkOverflow => true,
            _ => false,
        }
    }
}
