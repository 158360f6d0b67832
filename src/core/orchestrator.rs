//! # Orchestrator: the kernel facade.
//!
//! The [`Orchestrator`] owns the plugin and adapter registries, the event bus,
//! the telemetry sinks, the delivery queue and the clock. Every operation of the
//! kernel is reachable from here.
//!
//! ## High-level architecture
//! ```text
//! register(PluginDefinition)* ──► PluginRegistry
//! register_adapter(AdapterRef)* ─► AdapterRegistry
//!
//! resolve() ──► ExecutionOrder ──► timeline(&order) ──► Vec<ScheduleSlot>
//!
//! run_plan(&order, seed, RunOptions):
//!   Scope ─┬─ SinkSet (one worker per sink)
//!          ├─ bus listener: Bus ─► SinkSet::emit(&Event)
//!          └─ adapter.release() per used adapter
//!   Dispatcher::run per plugin ── publish(Event) ──► Bus
//!        └─ (publish_outputs) DeliveryQueue::publish(output)
//!   Scope::close() ──► ExecutionReport
//!
//! publish / subscribe / unsubscribe / metrics ──► DeliveryQueue
//! ```
//!
//! ## Example
//! ```rust
//! use plugvisor::{
//!     AdapterCall, AdapterError, AdapterFn, Config, Orchestrator, PluginDefinition,
//!     PluginOutput, Stage,
//! };
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut orch = Orchestrator::new(Config::default());
//!     orch.register_adapter(AdapterFn::arc("echo", |call: AdapterCall| async move {
//!         Ok::<_, AdapterError>(PluginOutput::new(json!({
//!             "plugin": call.plugin.name,
//!             "upstream": call.input.upstream.len(),
//!         })))
//!     }));
//!
//!     orch.register(PluginDefinition::new("scan", Stage::Discover).with_adapter("echo"))?;
//!     orch.register(
//!         PluginDefinition::new("plan", Stage::Model)
//!             .with_adapter("echo")
//!             .with_dependencies(["scan"]),
//!     )?;
//!
//!     let order = orch.resolve()?;
//!     let report = orch.run_plan(&order, json!({}), orch.run_options()).await?;
//!
//!     assert!(report.is_healthy());
//!     assert_eq!(report.summary.ok_count, 2);
//!     assert_eq!(report.outcome("plan").and_then(|o| o.output.clone()),
//!                Some(json!({ "plugin": "plan", "upstream": 1 })));
//!     orch.close().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::{
    clock::ClockRef,
    config::Config,
    delivery::{DeliveryQueue, HandlerRef, MessageId, PublishOptions, QueueMetrics, SubscriptionId},
    dispatch::{AdapterRef, AdapterRegistry, Dispatcher},
    error::{DeliveryError, ResolveError, RunError},
    events::{Bus, Event},
    plugins::{PluginDefinition, PluginRegistry},
    resolve::{ExecutionOrder, resolve_order},
    schedule::{ScheduleSlot, build_timeline},
    sinks::TelemetrySink,
};

use super::{
    builder::OrchestratorBuilder,
    options::RunOptions,
    report::ExecutionReport,
    runner::{self, PlanEnv},
};

/// Plugin orchestration kernel.
pub struct Orchestrator {
    cfg: Config,
    registry: PluginRegistry,
    adapters: Arc<AdapterRegistry>,
    bus: Bus,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    queue: DeliveryQueue,
    clock: ClockRef,
}

impl Orchestrator {
    /// Creates an orchestrator with no sinks and the system clock.
    ///
    /// For sinks, a custom clock or a shared queue use [`Orchestrator::builder`].
    pub fn new(cfg: Config) -> Self {
        OrchestratorBuilder::new(cfg).build()
    }

    /// Returns a builder.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        registry: PluginRegistry,
        adapters: Arc<AdapterRegistry>,
        bus: Bus,
        sinks: Vec<Arc<dyn TelemetrySink>>,
        queue: DeliveryQueue,
        clock: ClockRef,
    ) -> Self {
        Self {
            cfg,
            registry,
            adapters,
            bus,
            sinks,
            queue,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Registers a plugin; names are unique.
    pub fn register(&mut self, definition: PluginDefinition) -> Result<(), ResolveError> {
        self.registry.register(definition)
    }

    /// Registers an adapter, replacing (and returning) the previous one with the same id.
    ///
    /// Runs already in progress keep the registry they started with.
    pub fn register_adapter(&mut self, adapter: AdapterRef) -> Option<AdapterRef> {
        Arc::make_mut(&mut self.adapters).register(adapter)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Resolves the current registry into a deterministic execution order.
    pub fn resolve(&self) -> Result<ExecutionOrder, ResolveError> {
        resolve_order(&self.registry)
    }

    /// Builds the planned timeline of `order`, anchored at the clock's now.
    pub fn timeline(&self, order: &ExecutionOrder) -> Result<Vec<ScheduleSlot>, ResolveError> {
        self.timeline_at(order, self.clock.now())
    }

    /// Builds the planned timeline of `order`, anchored at `base_time`.
    pub fn timeline_at(
        &self,
        order: &ExecutionOrder,
        base_time: SystemTime,
    ) -> Result<Vec<ScheduleSlot>, ResolveError> {
        build_timeline(order, &self.registry, base_time, self.cfg.unit_duration)
    }

    /// Run options inheriting this orchestrator's config.
    pub fn run_options(&self) -> RunOptions {
        RunOptions::with_defaults(&self.cfg)
    }

    /// Executes `order` once.
    ///
    /// Every plugin in the order gets exactly one outcome in the report, in
    /// order. Plugin failures are reported in the outcomes; only an invalid
    /// order or a failed teardown is an `Err`.
    pub async fn run_plan(
        &self,
        order: &ExecutionOrder,
        seed: Value,
        opts: RunOptions,
    ) -> Result<ExecutionReport, RunError> {
        let dispatcher = Dispatcher::new(Arc::clone(&self.adapters), self.bus.clone());
        let env = PlanEnv {
            registry: &self.registry,
            dispatcher: &dispatcher,
            bus: &self.bus,
            sinks: &self.sinks,
            queue: &self.queue,
            clock: &self.clock,
            unit: self.cfg.unit_duration,
        };
        runner::run_plan(env, order, seed, opts).await
    }

    /// Publishes `payload` on the delivery queue.
    pub async fn publish(
        &self,
        payload: Value,
        opts: PublishOptions,
    ) -> Result<MessageId, DeliveryError> {
        self.queue.publish(payload, opts).await
    }

    /// Registers a delivery handler.
    pub fn subscribe(&self, handler: HandlerRef) -> SubscriptionId {
        self.queue.subscribe(handler)
    }

    /// Removes a delivery handler; `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.queue.unsubscribe(id)
    }

    /// Snapshot of delivery queue counters.
    pub fn metrics(&self) -> QueueMetrics {
        self.queue.metrics()
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Raw receiver of every event published on the bus.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Closes the delivery queue. Pending retries are dead-lettered.
    pub async fn close(&self) {
        self.queue.close().await;
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("plugins", &self.registry.len())
            .field("adapters", &self.adapters.ids())
            .field("sinks", &self.sinks.len())
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Adapter, AdapterCall, AdapterFn, OutcomeStatus, PluginInput, PluginOutput, RunContext, Telemetry};
    use crate::error::{AdapterError, DispatchError, HandlerError, ReleaseError};
    use crate::delivery::{DeliveryMessage, HandlerFn};
    use crate::events::EventKind;
    use crate::plugins::Stage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn def(name: &str, deps: &[&str]) -> PluginDefinition {
        PluginDefinition::new(name, Stage::Discover)
            .with_adapter("test")
            .with_dependencies(deps.iter().copied())
    }

    /// Adapter failing for the named plugins and recording every call.
    fn scripted(fail: &'static [&'static str], calls: Arc<Mutex<Vec<String>>>) -> AdapterRef {
        AdapterFn::arc("test", move |call: AdapterCall| {
            let calls = Arc::clone(&calls);
            async move {
                let name = call.plugin.name.clone();
                calls.lock().unwrap().push(name.clone());
                if fail.contains(&name.as_str()) {
                    return Err(AdapterError::fail(format!("{name} broke")));
                }
                Ok(PluginOutput::new(json!({ "from": name, "upstream": call.input.upstream })))
            }
        })
    }

    fn orchestrator(defs: Vec<PluginDefinition>, adapter: AdapterRef) -> Orchestrator {
        let mut orch = Orchestrator::builder(Config::default()).with_adapter(adapter).build();
        for d in defs {
            orch.register(d).unwrap();
        }
        orch
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn resolve_orders_dependencies_first() {
        let orch = orchestrator(
            vec![def("C", &["A", "B"]), def("B", &["A"]), def("A", &[])],
            scripted(&[], Arc::default()),
        );
        assert_eq!(orch.resolve().unwrap().as_slice(), ["A", "B", "C"]);
    }

    #[test]
    fn resolve_reports_cycles_and_missing_dependencies() {
        let orch = orchestrator(vec![def("X", &["Y"]), def("Y", &["X"])], scripted(&[], Arc::default()));
        match orch.resolve().unwrap_err() {
            ResolveError::CycleDetected { plugin, .. } => assert!(plugin == "X" || plugin == "Y"),
            other => panic!("unexpected {other:?}"),
        }

        let orch = orchestrator(vec![def("A", &["Z"])], scripted(&[], Arc::default()));
        assert_eq!(
            orch.resolve().unwrap_err(),
            ResolveError::MissingDependency { from: "A".into(), to: "Z".into() }
        );
    }

    #[tokio::test]
    async fn failed_dependency_skips_dependents() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orch = orchestrator(
            vec![def("A", &[]), def("B", &[]), def("C", &["B"]), def("D", &["C"])],
            scripted(&["B"], Arc::clone(&calls)),
        );
        let order = orch.resolve().unwrap();

        let report = orch.run_plan(&order, json!(null), orch.run_options()).await.unwrap();

        assert_eq!(report.summary.ok_count, 1);
        assert_eq!(report.summary.fail_count, 1);
        assert_eq!(report.summary.skipped_count, 2);
        assert!(!report.is_healthy());
        assert_eq!(
            report.outcome("C").unwrap().error,
            Some(DispatchError::DependencyFailed { plugin: "C".into(), dependency: "B".into() })
        );
        assert_eq!(
            report.outcome("D").unwrap().error,
            Some(DispatchError::DependencyFailed { plugin: "D".into(), dependency: "C".into() })
        );
        let mut called = calls.lock().unwrap().clone();
        called.sort();
        assert_eq!(called, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn independent_branch_survives_a_failure() {
        let orch = orchestrator(
            vec![def("root", &[]), def("bad", &["root"]), def("good", &["root"]), def("tail", &["good"])],
            scripted(&["bad"], Arc::default()),
        );
        let order = orch.resolve().unwrap();

        let report = orch.run_plan(&order, json!(null), orch.run_options()).await.unwrap();

        assert_eq!(report.outcome("tail").unwrap().status, OutcomeStatus::Succeeded);
        assert_eq!(report.outcome("bad").unwrap().status, OutcomeStatus::Failed);
        let names: Vec<&str> = report.outcomes.iter().map(|o| o.plugin.as_str()).collect();
        assert_eq!(names, order.as_slice());
    }

    #[tokio::test]
    async fn dependents_receive_seed_and_upstream_outputs() {
        let orch = orchestrator(vec![def("A", &[]), def("B", &["A"])], scripted(&[], Arc::default()));
        let order = orch.resolve().unwrap();

        let report = orch.run_plan(&order, json!({ "env": "dev" }), orch.run_options()).await.unwrap();

        let b = report.outcome("B").unwrap().output.clone().unwrap();
        assert_eq!(b["upstream"]["A"]["from"], "A");
    }

    #[tokio::test(start_paused = true)]
    async fn max_adapters_bounds_concurrency() {
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (l, p) = (Arc::clone(&live), Arc::clone(&peak));
        let adapter = AdapterFn::arc("test", move |_call: AdapterCall| {
            let (live, peak) = (Arc::clone(&l), Arc::clone(&p));
            async move {
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                live.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, AdapterError>(PluginOutput::default())
            }
        });
        let defs = ["a", "b", "c", "d", "e", "f"].iter().map(|n| def(n, &[])).collect();
        let orch = orchestrator(defs, adapter);
        let order = orch.resolve().unwrap();

        let opts = orch.run_options().with_max_adapters(2);
        let report = orch.run_plan(&order, json!(null), opts).await.unwrap();

        assert_eq!(report.summary.ok_count, 6);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn oversized_max_adapters_runs_unbounded() {
        let orch = orchestrator(
            vec![def("a", &[]), def("b", &[]), def("c", &["a"])],
            scripted(&[], Arc::default()),
        );
        let order = orch.resolve().unwrap();

        let opts = orch.run_options().with_max_adapters(usize::MAX);
        let report = orch.run_plan(&order, json!(null), opts).await.unwrap();

        assert_eq!(report.summary.ok_count, 3);
    }

    #[tokio::test]
    async fn huge_unit_duration_does_not_break_the_run() {
        let cfg = Config {
            unit_duration: Duration::MAX,
            ..Config::default()
        };
        let mut orch = Orchestrator::builder(cfg)
            .with_adapter(scripted(&[], Arc::default()))
            .build();
        orch.register(def("A", &[])).unwrap();
        orch.register(def("B", &["A"])).unwrap();
        let order = orch.resolve().unwrap();

        assert_eq!(orch.timeline(&order).unwrap()[1].starts_at, None);
        let report = orch.run_plan(&order, json!(null), orch.run_options()).await.unwrap();

        assert!(report.is_healthy());
        assert_eq!(report.timeline[1].start_offset, Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_plugin_failure() {
        let adapter = AdapterFn::arc("test", |call: AdapterCall| async move {
            if call.plugin.name == "slow" {
                std::future::pending::<()>().await;
            }
            Ok::<_, AdapterError>(PluginOutput::default())
        });
        let orch = orchestrator(vec![def("slow", &[]), def("after", &["slow"])], adapter);
        let order = orch.resolve().unwrap();

        let opts = orch.run_options().with_timeout(Duration::from_millis(50));
        let report = orch.run_plan(&order, json!(null), opts).await.unwrap();

        assert!(matches!(
            report.outcome("slow").unwrap().error,
            Some(DispatchError::AdapterTimeout { .. })
        ));
        assert_eq!(report.outcome("after").unwrap().status, OutcomeStatus::Skipped);
    }

    #[tokio::test]
    async fn cancelled_before_start_dispatches_nothing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orch = orchestrator(vec![def("A", &[]), def("B", &["A"])], scripted(&[], Arc::clone(&calls)));
        let order = orch.resolve().unwrap();
        let mut rx = orch.subscribe_events();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = orch
            .run_plan(&order, json!(null), orch.run_options().with_cancel(cancel))
            .await
            .unwrap();

        assert_eq!(report.summary.canceled_count, 2);
        assert!(calls.lock().unwrap().is_empty());
        let kinds: Vec<EventKind> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::RunCanceled).count(), 1);
        assert!(!kinds.contains(&EventKind::PluginStarted));
    }

    #[tokio::test]
    async fn cancellation_lets_in_flight_plugin_finish() {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let adapter = AdapterFn::arc("test", move |_call: AdapterCall| {
            let token = token.clone();
            async move {
                token.cancel();
                tokio::task::yield_now().await;
                Ok::<_, AdapterError>(PluginOutput::new(json!("done")))
            }
        });
        let orch = orchestrator(vec![def("A", &[]), def("B", &["A"])], adapter);
        let order = orch.resolve().unwrap();

        let report = orch
            .run_plan(&order, json!(null), orch.run_options().with_cancel(cancel))
            .await
            .unwrap();

        assert_eq!(report.outcome("A").unwrap().status, OutcomeStatus::Succeeded);
        assert_eq!(
            report.outcome("B").unwrap().error,
            Some(DispatchError::Canceled { plugin: "B".into() })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_permit_waiters() {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let adapter = AdapterFn::arc("test", move |call: AdapterCall| {
            let (token, seen) = (token.clone(), Arc::clone(&seen));
            async move {
                seen.lock().unwrap().push(call.plugin.name.clone());
                token.cancel();
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, AdapterError>(PluginOutput::new(json!("done")))
            }
        });
        let orch = orchestrator(vec![def("A", &[]), def("B", &[])], adapter);
        let order = orch.resolve().unwrap();
        let mut rx = orch.subscribe_events();

        let opts = orch.run_options().with_max_adapters(1).with_cancel(cancel);
        let report = orch.run_plan(&order, json!(null), opts).await.unwrap();

        assert_eq!(report.outcome("A").unwrap().status, OutcomeStatus::Succeeded);
        assert_eq!(
            report.outcome("B").unwrap().error,
            Some(DispatchError::Canceled { plugin: "B".into() })
        );
        assert_eq!(*calls.lock().unwrap(), vec!["A".to_owned()]);
        let canceled = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == EventKind::RunCanceled)
            .count();
        assert_eq!(canceled, 1);
    }

    #[tokio::test]
    async fn events_follow_run_and_plugin_lifecycle() {
        let orch = orchestrator(vec![def("A", &[]), def("B", &["A"])], scripted(&[], Arc::default()));
        let order = orch.resolve().unwrap();
        let mut rx = orch.subscribe_events();

        let report = orch.run_plan(&order, json!(null), orch.run_options()).await.unwrap();
        let events: Vec<Event> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.run_id == Some(report.run_id))
            .collect();

        assert_eq!(events.first().map(|e| e.kind), Some(EventKind::RunStarted));
        assert_eq!(events.first().and_then(|e| e.plugin_count), Some(2));
        assert_eq!(events.first().and_then(|e| e.attempt), None);
        assert_eq!(events.last().map(|e| e.kind), Some(EventKind::RunCompleted));
        assert_eq!(events.last().and_then(|e| e.ok), Some(true));
        for plugin in ["A", "B"] {
            let kinds: Vec<EventKind> = events
                .iter()
                .filter(|e| e.plugin.as_deref() == Some(plugin))
                .map(|e| e.kind)
                .collect();
            assert_eq!(kinds, vec![EventKind::PluginStarted, EventKind::PluginCompleted]);
        }
    }

    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl TelemetrySink for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }
    }

    #[tokio::test]
    async fn sinks_are_drained_before_run_returns() {
        let sink = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut orch = Orchestrator::builder(Config::default())
            .with_sink(sink.clone())
            .with_adapter(scripted(&[], Arc::default()))
            .build();
        orch.register(def("A", &[])).unwrap();
        let order = orch.resolve().unwrap();

        orch.run_plan(&order, json!(null), orch.run_options()).await.unwrap();

        let seen = sink.0.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&EventKind::RunStarted));
        assert!(seen.contains(&EventKind::RunCompleted));
    }

    #[tokio::test]
    async fn outputs_are_published_when_requested() {
        let orch = orchestrator(vec![def("A", &[]), def("B", &[])], scripted(&["B"], Arc::default()));
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        orch.subscribe(HandlerFn::arc("collect", move |msg: DeliveryMessage| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(msg.attribute("plugin").map(str::to_owned));
                Ok::<_, HandlerError>(())
            }
        }));
        let order = orch.resolve().unwrap();

        let opts = orch.run_options().with_publish_outputs(true);
        orch.run_plan(&order, json!(null), opts).await.unwrap();

        assert_eq!(*got.lock().unwrap(), vec![Some("A".to_owned())]);
        assert_eq!(orch.metrics().delivered, 1);
        orch.close().await;
    }

    struct Leaky(AtomicUsize);

    #[async_trait]
    impl Adapter for Leaky {
        fn id(&self) -> &str {
            "test"
        }

        async fn execute(
            &self,
            _plugin: &PluginDefinition,
            _input: &PluginInput,
            _ctx: &RunContext,
            _telemetry: &Telemetry,
        ) -> Result<PluginOutput, AdapterError> {
            Ok(PluginOutput::default())
        }

        async fn release(&self) -> Result<(), ReleaseError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ReleaseError::new("test", "connection reset"))
        }
    }

    #[tokio::test]
    async fn teardown_failure_keeps_the_report() {
        let leaky = Arc::new(Leaky(AtomicUsize::new(0)));
        let orch = orchestrator(vec![def("A", &[])], leaky.clone());
        let order = orch.resolve().unwrap();

        let err = orch.run_plan(&order, json!(null), orch.run_options()).await.unwrap_err();

        match err {
            RunError::Teardown { report, source } => {
                assert!(report.is_healthy());
                assert_eq!(source.failures.len(), 1);
                assert_eq!(source.failures[0].resource, "test");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(leaky.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_orders_are_rejected() {
        let orch = orchestrator(vec![def("A", &[]), def("B", &["A"])], scripted(&[], Arc::default()));
        let orch = &orch;
        let run = |names: &[&str]| {
            let order = ExecutionOrder::from_names(names.iter().copied());
            let opts = orch.run_options();
            async move { orch.run_plan(&order, json!(null), opts).await }
        };

        assert!(matches!(run(&["A", "Q"]).await, Err(RunError::UnknownPlugin { plugin }) if plugin == "Q"));
        assert!(matches!(run(&["A", "A"]).await, Err(RunError::DuplicateInOrder { .. })));
        assert!(matches!(
            run(&["B", "A"]).await,
            Err(RunError::OrderViolation { plugin, dependency }) if plugin == "B" && dependency == "A"
        ));
        assert!(matches!(run(&["B"]).await, Err(RunError::OrderViolation { .. })));
    }

    #[test]
    fn timeline_uses_configured_clock() {
        use crate::clock::ManualClock;
        use std::time::UNIX_EPOCH;

        let clock = ManualClock::new(UNIX_EPOCH);
        let mut orch = Orchestrator::builder(Config::default())
            .with_clock(Arc::new(clock.clone()))
            .build();
        orch.register(def("A", &[])).unwrap();
        orch.register(def("B", &["A"])).unwrap();
        clock.advance(Duration::from_secs(10));

        let order = orch.resolve().unwrap();
        let slots = orch.timeline(&order).unwrap();
        assert_eq!(slots[1].starts_at, Some(UNIX_EPOCH + Duration::from_secs(11)));
    }
}
