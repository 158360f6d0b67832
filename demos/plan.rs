//! # Example: plan
//!
//! A small infrastructure pipeline driven end to end:
//! - plugins across stages with dependencies, resolved into an order
//! - one adapter serving every plugin, reporting progress
//! - a failing plugin whose dependents are skipped
//! - outputs published to the delivery queue and consumed by a handler
//! - Ctrl-C cancels the run (in-flight plugins finish, the rest are cancelled)
//!
//! ## Flow
//! ```text
//! register ──► resolve() ──► timeline() ──► run_plan()
//!     ├─► RunStarted
//!     ├─► scan ─► plan ─► apply ─► verify
//!     │             └──► lint (fails) ─► report (skipped)
//!     ├─► outputs ──► DeliveryQueue ──► audit handler
//!     └─► RunCompleted ──► scope teardown
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example plan --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use plugvisor::{
    AdapterCall, AdapterError, AdapterFn, Config, DeliveryMessage, HandlerError, HandlerFn,
    LogWriter, Orchestrator, PluginDefinition, PluginOutput, Stage, cancel_on_shutdown_signal,
};

fn shell_adapter() -> plugvisor::AdapterRef {
    AdapterFn::arc("shell", |call: AdapterCall| async move {
        let name = call.plugin.name.clone();
        call.telemetry.note(format!("{name}: {} upstream input(s)", call.input.upstream.len()));

        // Ctrl-C stops new dispatches; work already started runs to completion.
        tokio::time::sleep(Duration::from_millis(150)).await;
        if call.ctx.is_cancelled() {
            call.telemetry.note(format!("{name}: finishing after cancel"));
        }

        if name == "lint" {
            return Err(AdapterError::fail("3 style violations"));
        }
        let mut out = PluginOutput::new(json!({ "plugin": name, "env": call.input.seed["env"] }));
        if name == "plan" {
            out = out.with_warning("2 resources will be replaced");
        }
        Ok(out)
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,plugvisor=debug".into()),
        )
        .init();

    let mut cfg = Config::default();
    cfg.max_adapters = 2;
    cfg.timeout = Duration::from_secs(5);

    let mut orch = Orchestrator::builder(cfg)
        .with_sink(Arc::new(LogWriter))
        .with_adapter(shell_adapter())
        .build();

    for def in [
        PluginDefinition::new("scan", Stage::Discover),
        PluginDefinition::new("plan", Stage::Model).with_dependencies(["scan"]),
        PluginDefinition::new("lint", Stage::Verify).with_dependencies(["scan"]),
        PluginDefinition::new("apply", Stage::Execute).with_dependencies(["plan"]),
        PluginDefinition::new("verify", Stage::Verify).with_dependencies(["apply"]),
        PluginDefinition::new("report", Stage::Optimize).with_dependencies(["lint", "verify"]),
    ] {
        orch.register(def.with_adapter("shell"))?;
    }

    orch.subscribe(HandlerFn::arc("audit", |msg: DeliveryMessage| async move {
        println!(
            "audit: {} from {}",
            msg.payload,
            msg.attribute("plugin").unwrap_or("?")
        );
        Ok::<_, HandlerError>(())
    }));

    let order = orch.resolve()?;
    for slot in orch.timeline(&order)? {
        println!(
            "slot {:>2} {:<8} {:<9} +{:>2}s .. +{:>2}s",
            slot.position,
            slot.plugin,
            slot.stage.as_str(),
            slot.start_offset.as_secs(),
            slot.end_offset.as_secs()
        );
    }

    let cancel = CancellationToken::new();
    let watcher = cancel_on_shutdown_signal(cancel.clone());

    let opts = orch
        .run_options()
        .with_tag("trigger", "demo")
        .with_publish_outputs(true)
        .with_cancel(cancel.clone());
    let report = orch.run_plan(&order, json!({ "env": "staging" }), opts).await?;

    cancel.cancel();
    let _ = watcher.await;

    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    for failed in report.failures() {
        println!("failed: {} ({:?})", failed.plugin, failed.error);
    }
    println!("queue: {:?}", orch.metrics());

    orch.close().await;
    Ok(())
}
