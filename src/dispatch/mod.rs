//! # Adapter dispatch layer.
//!
//! Executes one plugin through the adapter registered under its adapter id.
//!
//! ## Architecture
//! ```text
//! Dispatcher::run(plugin, input, ctx, timeout)
//!     │
//!     ├─► AdapterRegistry::get(plugin.adapter_id())   ── absent ──► NoAdapter
//!     ├─► publish PluginStarted
//!     ├─► adapter.is_available(ctx)                   ── false ───► AdapterUnavailable
//!     ├─► timeout(adapter.execute(plugin, input, ctx', telemetry))
//!     │       └─► elapsed: cancel child token, publish TimeoutHit ─► AdapterTimeout
//!     └─► publish PluginCompleted { ok, elapsed_ms, reason }
//! ```
//!
//! `ctx'` carries a child of the run's cancellation token, so a timed-out
//! adapter observes cancellation without affecting the rest of the run.

mod adapter;
mod adapter_fn;
mod context;
mod dispatcher;
mod io;
mod outcome;
mod registry;

pub use adapter::{Adapter, AdapterRef};
pub use adapter_fn::{AdapterCall, AdapterFn};
pub use context::{RunContext, Telemetry};
pub use dispatcher::Dispatcher;
pub use io::{PluginInput, PluginOutput};
pub use outcome::{DispatchOutcome, OutcomeStatus};
pub use registry::AdapterRegistry;
