//! # Adapter abstraction.
//!
//! An [`Adapter`] performs the actual work of a plugin. The kernel never
//! interprets payloads; it hands the adapter a [`PluginInput`] and stores the
//! returned [`PluginOutput`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AdapterError, ReleaseError};
use crate::plugins::PluginDefinition;

use super::context::{RunContext, Telemetry};
use super::io::{PluginInput, PluginOutput};

/// Shared handle to an adapter.
pub type AdapterRef = Arc<dyn Adapter>;

/// # Pluggable plugin executor.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use plugvisor::{
///     Adapter, AdapterError, PluginDefinition, PluginInput, PluginOutput, RunContext, Telemetry,
/// };
///
/// struct Echo;
///
/// #[async_trait]
/// impl Adapter for Echo {
///     fn id(&self) -> &str { "echo" }
///
///     async fn execute(
///         &self,
///         _plugin: &PluginDefinition,
///         input: &PluginInput,
///         ctx: &RunContext,
///         _telemetry: &Telemetry,
///     ) -> Result<PluginOutput, AdapterError> {
///         if ctx.is_cancelled() {
///             return Err(AdapterError::Canceled);
///         }
///         Ok(PluginOutput::new(input.seed.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Registry key of this adapter.
    fn id(&self) -> &str;

    /// Whether the adapter can serve the given run. Checked before every dispatch.
    fn is_available(&self, _ctx: &RunContext) -> bool {
        true
    }

    /// Executes one plugin.
    ///
    /// Implementations should watch `ctx.cancel_token()`; it fires on run
    /// cancellation and when the dispatch timeout elapses.
    async fn execute(
        &self,
        plugin: &PluginDefinition,
        input: &PluginInput,
        ctx: &RunContext,
        telemetry: &Telemetry,
    ) -> Result<PluginOutput, AdapterError>;

    /// Releases connections held for a run.
    ///
    /// Called once per run by the run scope for every adapter the plan used.
    async fn release(&self) -> Result<(), ReleaseError> {
        Ok(())
    }
}
