//! # Function-backed adapter (`AdapterFn`)
//!
//! [`AdapterFn`] wraps a closure `F: Fn(AdapterCall) -> Fut`, producing a fresh
//! future per dispatch. Each call receives owned copies of its arguments, so the
//! future does not borrow from the dispatcher.
//!
//! ## Example
//! ```rust
//! use plugvisor::{Adapter, AdapterCall, AdapterError, AdapterFn, AdapterRef, PluginOutput};
//!
//! let a: AdapterRef = AdapterFn::arc("double", |call: AdapterCall| async move {
//!     let n = call.input.seed.as_i64().unwrap_or(0);
//!     Ok::<_, AdapterError>(PluginOutput::new(serde_json::json!(n * 2)))
//! });
//!
//! assert_eq!(a.id(), "double");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::plugins::PluginDefinition;

use super::adapter::Adapter;
use super::context::{RunContext, Telemetry};
use super::io::{PluginInput, PluginOutput};

/// Owned arguments of one adapter call.
#[derive(Clone)]
pub struct AdapterCall {
    pub plugin: PluginDefinition,
    pub input: PluginInput,
    pub ctx: RunContext,
    pub telemetry: Telemetry,
}

/// Function-backed adapter implementation.
pub struct AdapterFn<F> {
    id: Cow<'static, str>,
    f: F,
}

impl<F> AdapterFn<F> {
    /// Creates a new function-backed adapter.
    ///
    /// Prefer [`AdapterFn::arc`] when you immediately need an [`AdapterRef`](super::AdapterRef).
    pub fn new(id: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { id: id.into(), f }
    }

    /// Creates the adapter and returns it as a shared handle.
    pub fn arc(id: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(id, f))
    }
}

#[async_trait]
impl<F, Fut> Adapter for AdapterFn<F>
where
    F: Fn(AdapterCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PluginOutput, AdapterError>> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        plugin: &PluginDefinition,
        input: &PluginInput,
        ctx: &RunContext,
        telemetry: &Telemetry,
    ) -> Result<PluginOutput, AdapterError> {
        let call = AdapterCall {
            plugin: plugin.clone(),
            input: input.clone(),
            ctx: ctx.clone(),
            telemetry: telemetry.clone(),
        };
        (self.f)(call).await
    }
}
