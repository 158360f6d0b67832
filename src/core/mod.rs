//! Runtime core: orchestration and run lifecycle.
//!
//! The public API from this module is [`Orchestrator`] (built directly or via
//! [`OrchestratorBuilder`]), the per-run [`RunOptions`] and the resulting
//! [`ExecutionReport`].
//!
//! Internal modules:
//! - [`runner`]: validates an order and drives one run inside a scope;
//! - [`orchestrator`]: the facade over registries, queue and runs;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod options;
mod orchestrator;
mod report;
mod runner;
mod shutdown;

pub use builder::OrchestratorBuilder;
pub use options::RunOptions;
pub use orchestrator::Orchestrator;
pub use report::{ExecutionReport, Summary};
pub use shutdown::{cancel_on_shutdown_signal, wait_for_shutdown_signal};
