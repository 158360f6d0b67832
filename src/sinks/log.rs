//! # Tracing-backed telemetry sink.
//!
//! [`LogWriter`] renders every telemetry event as a `tracing` event.
//! Lifecycle events go out at `info`, failures at `warn`.
//!
//! ## Output (fmt subscriber)
//! ```text
//! INFO  plugin started plugin="scan" run_id=5c1e...
//! WARN  plugin failed plugin="apply" elapsed_ms=12 reason="boom"
//! INFO  retry scheduled message_id=... attempt=1 delay_ms=10
//! WARN  message dead-lettered message_id=... attempt=3
//! ```
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use plugvisor::{Config, LogWriter, Orchestrator};
//! let orchestrator = Orchestrator::builder(Config::default())
//!     .with_sinks(vec![Arc::new(LogWriter)])
//!     .build();
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use super::TelemetrySink;
use crate::events::{Event, EventKind};

/// Sink that forwards events to `tracing`.
///
/// Enabled via the `logging` feature. Install a subscriber (for example
/// `tracing_subscriber::fmt`) to see the output.
pub struct LogWriter;

#[async_trait]
impl TelemetrySink for LogWriter {
    async fn on_event(&self, e: &Event) {
        let plugin = e.plugin.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::RunStarted => {
                info!(run_id = ?e.run_id, plugins = ?e.plugin_count, "run started");
            }
            EventKind::RunCompleted if e.ok == Some(true) => {
                info!(run_id = ?e.run_id, elapsed_ms = ?e.elapsed_ms, "run completed");
            }
            EventKind::RunCompleted => {
                warn!(run_id = ?e.run_id, elapsed_ms = ?e.elapsed_ms, "run completed with failures");
            }
            EventKind::RunCanceled => warn!(run_id = ?e.run_id, "run canceled"),
            EventKind::PluginStarted => info!(plugin, run_id = ?e.run_id, "plugin started"),
            EventKind::PluginCompleted if e.ok == Some(true) => {
                info!(plugin, elapsed_ms = ?e.elapsed_ms, "plugin completed");
            }
            EventKind::PluginCompleted => {
                warn!(plugin, elapsed_ms = ?e.elapsed_ms, reason, "plugin failed");
            }
            EventKind::TimeoutHit => warn!(plugin, timeout_ms = ?e.timeout_ms, "plugin timed out"),
            EventKind::PluginSkipped => warn!(plugin, reason, "plugin skipped"),
            EventKind::PluginProgress => info!(plugin, note = reason, "plugin progress"),
            EventKind::MessagePublished => info!(message_id = ?e.message_id, "message published"),
            EventKind::DeliveryFailed => {
                warn!(message_id = ?e.message_id, attempt = ?e.attempt, reason, "delivery failed");
            }
            EventKind::RetryScheduled => {
                info!(
                    message_id = ?e.message_id,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    "retry scheduled"
                );
            }
            EventKind::MessageDeadLettered => {
                warn!(message_id = ?e.message_id, attempt = ?e.attempt, reason, "message dead-lettered");
            }
            EventKind::ResourceReleased => info!(resource = ?e.resource, "resource released"),
            EventKind::ReleaseFailed => warn!(resource = ?e.resource, reason, "release failed"),
            EventKind::SinkPanicked | EventKind::SinkOverflow => {
                warn!(sink = ?e.resource, reason, "telemetry sink degraded");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
