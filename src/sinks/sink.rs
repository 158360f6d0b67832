//! # Telemetry sink trait.
//!
//! Each sink gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-sink bounded queue** (capacity via [`TelemetrySink::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::SinkPanicked`)
//!
//! ## Rules
//! - A slow sink only affects its own queue.
//! - Queue overflow drops the event **for this sink only** and publishes
//!   `EventKind::SinkOverflow`.
//! - Events are processed sequentially (FIFO) per sink.
//! - Sinks never block the dispatcher or each other.
//!
//! A run with no sinks is valid; telemetry is then simply not observed.

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of start/complete/error telemetry.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait TelemetrySink: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the sink's worker task, in FIFO order.
    async fn on_event(&self, event: &Event);

    /// Sink name used in logs and overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`; override it with something short.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to a minimum of 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
