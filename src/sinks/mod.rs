//! # Telemetry sinks.
//!
//! This module provides the [`TelemetrySink`] trait and the [`SinkSet`] fan-out
//! that delivers bus events to every sink of a run.
//!
//! ## Architecture
//! ```text
//! Dispatcher ── publish(Event) ──► Bus ──► run listener ──► SinkSet::emit(&Event)
//!                                                             │
//!                                                   ┌─────────┼─────────┐
//!                                                   ▼         ▼         ▼
//!                                               [queue 1] [queue 2] [queue N]
//!                                                   │         │         │
//!                                               LogWriter  Metrics   Custom
//! ```
//!
//! ## Implementing custom sinks
//! ```no_run
//! use plugvisor::{Event, EventKind, TelemetrySink};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl TelemetrySink for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.is_failure() {
//!             // increment failure counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod sink;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SinkSet;
pub use sink::TelemetrySink;
