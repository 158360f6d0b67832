//! Telemetry events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the plan runner (`RunStarted`/`RunCompleted`/`PluginSkipped`),
//!   the [`Dispatcher`](crate::Dispatcher) (`PluginStarted`/`PluginCompleted`/`TimeoutHit`),
//!   adapters via [`Telemetry`](crate::Telemetry), the delivery queue and the scope.
//! - **Consumers**: the run's bus listener, which fans out to the
//!   [`SinkSet`](crate::SinkSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
