//! # plugvisor
//!
//! **Plugvisor** is an in-process plugin orchestration kernel for Rust.
//!
//! Plugins declare a lifecycle stage and the plugins they depend on. The
//! kernel resolves them into a deterministic order, plans a timeline, runs
//! each plugin through a pluggable adapter with bounded concurrency, fans
//! lifecycle events out to telemetry sinks, delivers outputs through a
//! retrying queue and releases every run resource in reverse order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//!  │ PluginDefinition │  │ PluginDefinition │  │ PluginDefinition │
//!  │ (scan, Discover) │  │ (plan, Model)    │  │ (apply, Execute) │
//!  └────────┬─────────┘  └────────┬─────────┘  └────────┬─────────┘
//!           ▼                     ▼                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - PluginRegistry ──► resolve_order ──► ExecutionOrder            │
//! │  - build_timeline ──► Vec<ScheduleSlot>                           │
//! │  - AdapterRegistry (adapter id ──► Adapter)                       │
//! │  - DeliveryQueue (at-least-once, retry + dead letter)             │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   ┌────────────┐     ┌────────────┐     ┌────────────┐       │
//!   │ Dispatcher │     │ Dispatcher │     │ Dispatcher │       │
//!   │ (1 plugin) │     │ (1 plugin) │     │ (1 plugin) │       │
//!   └┬───────────┘     └┬───────────┘     └┬───────────┘       │
//!    │ PluginStarted    │ PluginProgress   │ TimeoutHit        │
//!    │ PluginCompleted  │ PluginCompleted  │ PluginCompleted   │ RetryScheduled
//!    ▼                  ▼                  ▼                   ▼ DeadLettered
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! │                  (capacity: Config::bus_capacity)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                          run listener (per run)
//!                                   ▼
//!                      SinkSet (per-sink bounded queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                     worker1   worker2   workerN
//!                        ▼         ▼         ▼
//!                  sink.on_event(&Event) (panics isolated)
//! ```
//!
//! ### Run lifecycle
//! ```text
//! run_plan(order, seed, RunOptions)
//!   ├─► validate order (known names, no duplicates, dependencies first)
//!   ├─► open Scope: sinks, listener, adapters
//!   ├─► publish RunStarted
//!   ├─► loop over ready plugins (position order):
//!   │     ├─ acquire permit (optional, cancellable)
//!   │     ├─ Dispatcher::run(plugin, seed + upstream outputs, timeout)
//!   │     │     ├─ Ok  ──► dependents may become ready
//!   │     │     └─ Err ──► transitive dependents: PluginSkipped
//!   │     └─ (publish_outputs) DeliveryQueue::publish(output)
//!   ├─► cancellation: RunCanceled, remaining plugins Canceled
//!   ├─► publish RunCompleted{ ok }
//!   └─► Scope::close() in reverse order ──► ExecutionReport
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                                 |
//! |-------------------|--------------------------------------------------------------|----------------------------------------------------|
//! | **Plugins**       | Named plugins with stage and dependencies.                   | [`PluginDefinition`], [`PluginRegistry`], [`Stage`] |
//! | **Resolution**    | Deterministic topological order, cycle detection.            | [`resolve_order`], [`ExecutionOrder`]              |
//! | **Timeline**      | Planned start/end offsets per plugin.                        | [`build_timeline`], [`ScheduleSlot`]               |
//! | **Dispatch**      | Adapters execute plugins with timeout and cancellation.      | [`Adapter`], [`AdapterFn`], [`Dispatcher`]         |
//! | **Delivery**      | At-least-once queue with backoff retries and dead letters.   | [`DeliveryQueue`], [`Handler`], [`HandlerFn`]      |
//! | **Scopes**        | Reverse-order release of run resources.                      | [`Scope`], [`Resource`]                            |
//! | **Telemetry**     | Typed lifecycle events fanned out to sinks.                  | [`Event`], [`EventKind`], [`TelemetrySink`]        |
//! | **Policies**      | Retry backoff and jitter.                                    | [`BackoffPolicy`], [`JitterPolicy`]                |
//! | **Errors**        | Typed errors per concern.                                    | [`RunError`], [`DispatchError`], [`ResolveError`]  |
//! | **Configuration** | Centralized defaults.                                        | [`Config`], [`RunOptions`]                         |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] sink _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use plugvisor::{
//!     AdapterCall, AdapterError, AdapterFn, Config, Orchestrator, PluginDefinition, PluginOutput,
//!     Stage, TelemetrySink,
//! };
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.timeout = Duration::from_secs(5);
//!
//!     // Sinks (optional)
//!     #[cfg(feature = "logging")]
//!     let sinks: Vec<Arc<dyn TelemetrySink>> = vec![Arc::new(plugvisor::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let sinks: Vec<Arc<dyn TelemetrySink>> = Vec::new();
//!
//!     let mut orch = Orchestrator::builder(cfg)
//!         .with_sinks(sinks)
//!         .with_adapter(AdapterFn::arc("shell", |call: AdapterCall| async move {
//!             call.telemetry.note(format!("running {}", call.plugin.name));
//!             Ok::<_, AdapterError>(PluginOutput::new(json!({ "ran": call.plugin.name })))
//!         }))
//!         .build();
//!
//!     orch.register(PluginDefinition::new("scan", Stage::Discover).with_adapter("shell"))?;
//!     orch.register(
//!         PluginDefinition::new("apply", Stage::Execute)
//!             .with_adapter("shell")
//!             .with_dependencies(["scan"]),
//!     )?;
//!
//!     let order = orch.resolve()?;
//!     assert_eq!(order.as_slice(), ["scan", "apply"]);
//!
//!     let report = orch.run_plan(&order, json!({ "env": "dev" }), orch.run_options()).await?;
//!     assert!(report.is_healthy());
//!     orch.close().await;
//!     Ok(())
//! }
//! ```
mod clock;
mod config;
mod core;
mod delivery;
mod dispatch;
mod error;
mod events;
mod plugins;
mod policies;
mod resolve;
mod schedule;
mod scope;
mod sinks;

// ---- Public re-exports ----

pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use config::Config;
pub use core::{
    ExecutionReport, Orchestrator, OrchestratorBuilder, RunOptions, Summary,
    cancel_on_shutdown_signal, wait_for_shutdown_signal,
};
pub use delivery::{
    DeliveryMessage, DeliveryQueue, Handler, HandlerFn, HandlerRef, MessageId, PublishOptions,
    QueueConfig, QueueMetrics, SubscriptionId,
};
pub use dispatch::{
    Adapter, AdapterCall, AdapterFn, AdapterRef, AdapterRegistry, DispatchOutcome, Dispatcher,
    OutcomeStatus, PluginInput, PluginOutput, RunContext, Telemetry,
};
pub use error::{
    AdapterError, DeliveryError, DispatchError, HandlerError, ReleaseError, ResolveError, RunError,
    ScopeError,
};
pub use events::{Bus, Event, EventKind};
pub use plugins::{ParseStageError, PluginDefinition, PluginRegistry, Stage};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use resolve::{DependencyGraph, ExecutionOrder, resolve_order};
pub use schedule::{ScheduleSlot, build_timeline};
pub use scope::{Resource, Scope};
pub use sinks::{SinkSet, TelemetrySink};

// Optional: expose a simple built-in logger sink (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use sinks::LogWriter;
