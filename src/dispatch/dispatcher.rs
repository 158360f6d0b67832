//! # Dispatch of a single plugin.
//!
//! [`Dispatcher::run`] executes one plugin with an optional timeout and
//! publishes its lifecycle events to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   PluginStarted → execute() → Ok(output) → PluginCompleted(ok=true)
//!
//! Failure:
//!   PluginStarted → execute() → Err(Fail) → PluginCompleted(ok=false)
//!
//! Lookup / availability:
//!   PluginStarted → NoAdapter | AdapterUnavailable → PluginCompleted(ok=false)
//!
//! Timeout:
//!   PluginStarted → deadline → cancel child → TimeoutHit → PluginCompleted(ok=false)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** `PluginStarted` followed by **exactly one**
//!   `PluginCompleted`, both from the calling task (so in that order).
//! - `TimeoutHit` is published **in addition to** `PluginCompleted` on timeout.
//! - Derives a **child token** per dispatch; cancelling it never affects the run.
//! - Adapter errors and panics both become a failed [`DispatchOutcome`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{self, Instant};

use crate::error::{AdapterError, DispatchError};
use crate::events::{Bus, EventKind};
use crate::plugins::PluginDefinition;

use super::context::{RunContext, Telemetry};
use super::io::{PluginInput, PluginOutput};
use super::outcome::DispatchOutcome;
use super::registry::AdapterRegistry;

/// Executes plugins through the adapters of an [`AdapterRegistry`].
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    adapters: Arc<AdapterRegistry>,
    bus: Bus,
}

impl Dispatcher {
    pub fn new(adapters: Arc<AdapterRegistry>, bus: Bus) -> Self {
        Self { adapters, bus }
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Dispatches `plugin` once.
    ///
    /// `timeout` of `None` (or zero) means no deadline.
    pub async fn run(
        &self,
        plugin: &PluginDefinition,
        input: &PluginInput,
        ctx: &RunContext,
        timeout: Option<Duration>,
    ) -> DispatchOutcome {
        let started_at = ctx.now();
        let started = Instant::now();
        self.bus
            .publish(ctx.event(EventKind::PluginStarted).with_plugin(plugin.name.as_str()));
        tracing::debug!(plugin = %plugin.name, run_id = %ctx.run_id, "dispatch started");

        let result = self.execute(plugin, input, ctx, timeout).await;
        let elapsed = started.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let completed = ctx
            .event(EventKind::PluginCompleted)
            .with_plugin(plugin.name.as_str())
            .with_elapsed(elapsed);

        match result {
            Ok(output) => {
                self.bus.publish(completed.with_ok(true));
                tracing::debug!(plugin = %plugin.name, elapsed_ms, "dispatch finished");
                DispatchOutcome::succeeded(
                    &plugin.name,
                    output.value,
                    output.warnings,
                    elapsed_ms,
                    started_at,
                )
            }
            Err(err) => {
                self.bus
                    .publish(completed.with_ok(false).with_reason(err.to_string()));
                tracing::warn!(
                    plugin = %plugin.name,
                    label = err.as_label(),
                    error = %err,
                    elapsed_ms,
                    "dispatch failed"
                );
                DispatchOutcome::failed(err, elapsed_ms, Some(started_at))
            }
        }
    }

    async fn execute(
        &self,
        plugin: &PluginDefinition,
        input: &PluginInput,
        ctx: &RunContext,
        timeout: Option<Duration>,
    ) -> Result<PluginOutput, DispatchError> {
        let adapter_id = plugin.adapter_id();
        let adapter = self
            .adapters
            .get(adapter_id)
            .ok_or_else(|| DispatchError::NoAdapter {
                plugin: plugin.name.clone(),
                adapter: adapter_id.to_owned(),
            })?;

        if !adapter.is_available(ctx) {
            return Err(DispatchError::AdapterUnavailable {
                plugin: plugin.name.clone(),
                adapter: adapter_id.to_owned(),
            });
        }

        let child = ctx.cancel_token().child_token();
        let call_ctx = ctx.with_cancel(child.clone());
        let telemetry = Telemetry::new(self.bus.clone(), ctx.clone(), plugin.name.as_str());
        let call = AssertUnwindSafe(adapter.execute(plugin, input, &call_ctx, &telemetry))
            .catch_unwind()
            .map(|r| r.unwrap_or_else(|_| Err(AdapterError::fail("adapter panicked"))));

        let res = match timeout.filter(|d| !d.is_zero()) {
            Some(dur) => match time::timeout(dur, call).await {
                Ok(r) => r,
                Err(_elapsed) => {
                    child.cancel();
                    self.bus.publish(
                        ctx.event(EventKind::TimeoutHit)
                            .with_plugin(plugin.name.as_str())
                            .with_timeout(dur),
                    );
                    return Err(DispatchError::AdapterTimeout {
                        plugin: plugin.name.clone(),
                        timeout: dur,
                    });
                }
            },
            None => call.await,
        };

        res.map_err(|e| DispatchError::AdapterExecutionFailed {
            plugin: plugin.name.clone(),
            error: match e {
                AdapterError::Fail { error } => error,
                other => other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{AdapterCall, AdapterFn, AdapterRef, OutcomeStatus, PluginOutput};
    use crate::events::Event;
    use crate::plugins::Stage;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn dispatcher(adapters: AdapterRegistry) -> (Dispatcher, broadcast::Receiver<Event>) {
        let bus = Bus::new(64);
        let rx = bus.subscribe();
        (Dispatcher::new(Arc::new(adapters), bus), rx)
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn success_publishes_started_then_completed() {
        let adapters: AdapterRegistry = [AdapterFn::arc("scan", |call: AdapterCall| async move {
            call.telemetry.note("working");
            Ok::<_, AdapterError>(PluginOutput::new(json!({ "seed": call.input.seed })))
        }) as AdapterRef]
        .into_iter()
        .collect();
        let (d, mut rx) = dispatcher(adapters);

        let plugin = PluginDefinition::new("scan", Stage::Discover);
        let out = d
            .run(&plugin, &PluginInput::new(json!(7)), &RunContext::new(), None)
            .await;

        assert!(out.ok());
        assert_eq!(out.output, Some(json!({ "seed": 7 })));
        assert_eq!(
            drain(&mut rx),
            vec![EventKind::PluginStarted, EventKind::PluginProgress, EventKind::PluginCompleted]
        );
    }

    #[tokio::test]
    async fn missing_adapter_fails_without_panicking() {
        let (d, mut rx) = dispatcher(AdapterRegistry::new());
        let plugin = PluginDefinition::new("apply", Stage::Execute).with_adapter("terraform");

        let out = d
            .run(&plugin, &PluginInput::default(), &RunContext::new(), None)
            .await;

        assert_eq!(out.status, OutcomeStatus::Failed);
        assert!(matches!(
            out.error,
            Some(DispatchError::NoAdapter { ref adapter, .. }) if adapter == "terraform"
        ));
        assert_eq!(drain(&mut rx), vec![EventKind::PluginStarted, EventKind::PluginCompleted]);
    }

    struct Offline;

    #[async_trait::async_trait]
    impl crate::dispatch::Adapter for Offline {
        fn id(&self) -> &str {
            "offline"
        }

        fn is_available(&self, _ctx: &RunContext) -> bool {
            false
        }

        async fn execute(
            &self,
            _plugin: &PluginDefinition,
            _input: &PluginInput,
            _ctx: &RunContext,
            _telemetry: &Telemetry,
        ) -> Result<PluginOutput, AdapterError> {
            unreachable!("unavailable adapters are never executed")
        }
    }

    #[tokio::test]
    async fn unavailable_adapter_is_not_executed() {
        let (d, _rx) = dispatcher([Arc::new(Offline) as AdapterRef].into_iter().collect());
        let plugin = PluginDefinition::new("offline", Stage::Verify);

        let out = d
            .run(&plugin, &PluginInput::default(), &RunContext::new(), None)
            .await;

        assert!(matches!(out.error, Some(DispatchError::AdapterUnavailable { .. })));
    }

    #[tokio::test]
    async fn adapter_error_becomes_execution_failure() {
        let adapters: AdapterRegistry = [AdapterFn::arc("b", |_call: AdapterCall| async {
            Err::<PluginOutput, _>(AdapterError::fail("boom"))
        }) as AdapterRef]
        .into_iter()
        .collect();
        let (d, _rx) = dispatcher(adapters);

        let out = d
            .run(
                &PluginDefinition::new("b", Stage::Model),
                &PluginInput::default(),
                &RunContext::new(),
                None,
            )
            .await;

        assert_eq!(
            out.error,
            Some(DispatchError::AdapterExecutionFailed {
                plugin: "b".into(),
                error: "boom".into(),
            })
        );
    }

    #[tokio::test]
    async fn adapter_panic_is_reported_as_failure() {
        let adapters: AdapterRegistry = [AdapterFn::arc("p", |call: AdapterCall| async move {
            if call.input.seed.is_null() {
                panic!("adapter bug");
            }
            Ok::<_, AdapterError>(PluginOutput::default())
        }) as AdapterRef]
        .into_iter()
        .collect();
        let (d, mut rx) = dispatcher(adapters);

        let out = d
            .run(
                &PluginDefinition::new("p", Stage::Execute),
                &PluginInput::default(),
                &RunContext::new(),
                None,
            )
            .await;

        assert_eq!(out.status, OutcomeStatus::Failed);
        assert_eq!(drain(&mut rx), vec![EventKind::PluginStarted, EventKind::PluginCompleted]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_child_and_reports() {
        let adapters: AdapterRegistry = [AdapterFn::arc("slow", |call: AdapterCall| async move {
            call.ctx.cancel_token().cancelled().await;
            Err::<PluginOutput, _>(AdapterError::Canceled)
        }) as AdapterRef]
        .into_iter()
        .collect();
        let (d, mut rx) = dispatcher(adapters);
        let ctx = RunContext::new();

        let out = d
            .run(
                &PluginDefinition::new("slow", Stage::Optimize),
                &PluginInput::default(),
                &ctx,
                Some(Duration::from_millis(50)),
            )
            .await;

        assert!(matches!(out.error, Some(DispatchError::AdapterTimeout { .. })));
        assert!(out.elapsed_ms >= 50);
        assert!(!ctx.is_cancelled(), "run token must survive a plugin timeout");
        assert_eq!(
            drain(&mut rx),
            vec![EventKind::PluginStarted, EventKind::TimeoutHit, EventKind::PluginCompleted]
        );
    }
}
