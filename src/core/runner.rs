//! # Plan execution.
//!
//! Runs a validated [`ExecutionOrder`] inside one [`Scope`].
//!
//! ## Flow
//! ```text
//! validate(order) ──► build_timeline ──► open Scope
//!                                          ├─ SinkSet (close on teardown)
//!                                          ├─ bus listener ─► SinkSet::emit
//!                                          └─ adapter.release() per used adapter
//! RunStarted
//! loop {
//!   ├─► ready plugins, position order:
//!   │     acquire permit (cancellable) ─► spawn Dispatcher::run ─► publish output (optional)
//!   └─► join one:
//!         ├─ ok   ─► store output, dependents with all deps done become ready
//!         └─ fail ─► transitive dependents: PluginSkipped (DependencyFailed)
//! }
//! cancellation: no new dispatch, in-flight calls finish, the rest become Canceled
//! RunCompleted ──► Scope::close() (reverse order) ──► ExecutionReport
//! ```

use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::ClockRef;
use crate::delivery::{DeliveryQueue, PublishOptions};
use crate::dispatch::{AdapterRef, DispatchOutcome, Dispatcher, PluginInput, RunContext};
use crate::error::{DispatchError, ReleaseError, RunError};
use crate::events::{Bus, Event, EventKind};
use crate::plugins::{PluginDefinition, PluginRegistry};
use crate::resolve::ExecutionOrder;
use crate::schedule::build_timeline;
use crate::scope::Scope;
use crate::sinks::{SinkSet, TelemetrySink};

use super::options::RunOptions;
use super::report::{ExecutionReport, Summary};

/// Everything a run borrows from the orchestrator.
pub(crate) struct PlanEnv<'a> {
    pub registry: &'a PluginRegistry,
    pub dispatcher: &'a Dispatcher,
    pub bus: &'a Bus,
    pub sinks: &'a [Arc<dyn TelemetrySink>],
    pub queue: &'a DeliveryQueue,
    pub clock: &'a ClockRef,
    pub unit: Duration,
}

/// Validated plan: definitions and dependency edges by position.
struct Plan<'a> {
    defs: Vec<&'a PluginDefinition>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl<'a> Plan<'a> {
    fn validate(registry: &'a PluginRegistry, order: &ExecutionOrder) -> Result<Self, RunError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(order.len());
        let mut defs = Vec::with_capacity(order.len());

        for (pos, name) in order.iter().enumerate() {
            let def = registry.get(name).ok_or_else(|| RunError::UnknownPlugin {
                plugin: name.to_owned(),
            })?;
            if index.insert(name, pos).is_some() {
                return Err(RunError::DuplicateInOrder {
                    plugin: name.to_owned(),
                });
            }
            defs.push(def);
        }

        let mut deps = vec![Vec::new(); defs.len()];
        let mut dependents = vec![Vec::new(); defs.len()];
        for (pos, def) in defs.iter().enumerate() {
            for dep in &def.dependencies {
                match index.get(dep.as_str()) {
                    Some(&d) if d < pos => {
                        deps[pos].push(d);
                        dependents[d].push(pos);
                    }
                    _ => {
                        return Err(RunError::OrderViolation {
                            plugin: def.name.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            defs,
            deps,
            dependents,
        })
    }

    fn len(&self) -> usize {
        self.defs.len()
    }

    fn name(&self, pos: usize) -> &str {
        &self.defs[pos].name
    }

    /// Registered adapters used by the plan, deduplicated, in id order.
    fn adapters(&self, dispatcher: &Dispatcher) -> Vec<AdapterRef> {
        let ids: BTreeSet<&str> = self.defs.iter().map(|d| d.adapter_id()).collect();
        ids.into_iter()
            .filter_map(|id| dispatcher.adapters().get(id))
            .collect()
    }
}

/// Mutable bookkeeping of one run.
struct Driver<'p, 'a> {
    plan: &'p Plan<'a>,
    ctx: RunContext,
    bus: Bus,
    outcomes: Vec<Option<DispatchOutcome>>,
    outputs: Vec<Option<Value>>,
    remaining: Vec<usize>,
    ready: BTreeSet<usize>,
    cancel_seen: bool,
}

impl<'p, 'a> Driver<'p, 'a> {
    fn new(plan: &'p Plan<'a>, ctx: RunContext, bus: Bus) -> Self {
        let remaining: Vec<usize> = plan.deps.iter().map(Vec::len).collect();
        let ready = (0..plan.len()).filter(|&i| remaining[i] == 0).collect();
        Self {
            plan,
            ctx,
            bus,
            outcomes: vec![None; plan.len()],
            outputs: vec![None; plan.len()],
            remaining,
            ready,
            cancel_seen: false,
        }
    }

    fn input_for(&self, pos: usize, seed: &Value) -> PluginInput {
        let mut input = PluginInput::new(seed.clone());
        for &d in &self.plan.deps[pos] {
            if let Some(v) = &self.outputs[d] {
                input.upstream.insert(self.plan.name(d).to_owned(), v.clone());
            }
        }
        input
    }

    fn observe_cancel(&mut self) -> bool {
        let cancelled = self.ctx.is_cancelled();
        if cancelled && !self.cancel_seen {
            self.cancel_seen = true;
            tracing::debug!(run_id = %self.ctx.run_id, "run cancelled; no new dispatch");
            self.bus.publish(self.ctx.event(EventKind::RunCanceled));
        }
        cancelled
    }

    fn settle(&mut self, pos: usize, outcome: DispatchOutcome) {
        if outcome.ok() {
            self.outputs[pos] = outcome.output.clone();
            self.outcomes[pos] = Some(outcome);
            for &d in &self.plan.dependents[pos] {
                self.remaining[d] -= 1;
                if self.remaining[d] == 0 && self.outcomes[d].is_none() {
                    self.ready.insert(d);
                }
            }
        } else {
            self.outcomes[pos] = Some(outcome);
            self.skip_dependents(pos);
        }
    }

    /// Marks every transitive dependent of `failed` as skipped.
    fn skip_dependents(&mut self, failed: usize) {
        let plan = self.plan;
        let mut stack = vec![failed];
        while let Some(p) = stack.pop() {
            for &d in &plan.dependents[p] {
                if self.outcomes[d].is_some() {
                    continue;
                }
                let err = DispatchError::DependencyFailed {
                    plugin: plan.name(d).to_owned(),
                    dependency: plan.name(p).to_owned(),
                };
                self.not_dispatched(d, err);
                stack.push(d);
            }
        }
    }

    fn not_dispatched(&mut self, pos: usize, err: DispatchError) {
        tracing::debug!(plugin = %self.plan.name(pos), reason = %err, "plugin not dispatched");
        self.bus.publish(
            self.ctx
                .event(EventKind::PluginSkipped)
                .with_plugin(self.plan.name(pos))
                .with_reason(err.to_string()),
        );
        self.ready.remove(&pos);
        self.outcomes[pos] = Some(DispatchOutcome::not_dispatched(err));
    }

    /// Outcomes in position order; anything left without one was cancelled.
    fn finish(mut self) -> Vec<DispatchOutcome> {
        for pos in 0..self.plan.len() {
            if self.outcomes[pos].is_none() {
                let err = DispatchError::Canceled {
                    plugin: self.plan.name(pos).to_owned(),
                };
                self.not_dispatched(pos, err);
            }
        }
        self.outcomes.into_iter().flatten().collect()
    }
}

/// Executes `order` and returns its report.
pub(crate) async fn run_plan(
    env: PlanEnv<'_>,
    order: &ExecutionOrder,
    seed: Value,
    opts: RunOptions,
) -> Result<ExecutionReport, RunError> {
    let plan = Plan::validate(env.registry, order)?;
    let started_at = env.clock.now();
    let timeline = build_timeline(order, env.registry, started_at, env.unit)?;

    let run_id = Uuid::new_v4();
    let ctx = RunContext::with_parts(run_id, opts.cancel.clone(), Arc::clone(env.clock))
        .with_tenant(opts.tenant.clone())
        .with_workspace(opts.workspace.clone())
        .with_tags(opts.run_tags.clone());

    let mut scope = open_scope(&env, &plan, run_id);

    let started = Instant::now();
    tracing::debug!(%run_id, plugins = plan.len(), "run started");
    env.bus.publish(ctx.event(EventKind::RunStarted).with_plugin_count(plan.len()));

    let outcomes = drive(&env, &plan, ctx.clone(), &seed, &opts).await;

    let summary = Summary::from_outcomes(&outcomes, started_at, env.clock.now());
    let report = ExecutionReport {
        run_id,
        outcomes,
        summary,
        timeline,
    };
    let healthy = report.is_healthy();
    tracing::debug!(%run_id, healthy, "run completed");
    env.bus.publish(
        ctx.event(EventKind::RunCompleted)
            .with_ok(healthy)
            .with_elapsed(started.elapsed()),
    );

    match scope.close().await {
        Ok(()) => Ok(report),
        Err(source) => Err(RunError::Teardown {
            report: Box::new(report),
            source,
        }),
    }
}

/// Opens the run scope: sink set, bus listener, then adapters.
fn open_scope(env: &PlanEnv<'_>, plan: &Plan<'_>, run_id: Uuid) -> Scope {
    let mut scope = Scope::new(format!("run-{run_id}")).with_bus(env.bus.clone());

    let sinks = Arc::new(SinkSet::new(env.sinks.to_vec(), env.bus.clone()));
    let set = Arc::clone(&sinks);
    scope.defer_async("telemetry-sinks", move || async move {
        set.close().await;
        Ok(())
    });

    let stop = CancellationToken::new();
    let listener = spawn_listener(env.bus.subscribe(), sinks, run_id, stop.clone());
    scope.defer_async("event-listener", move || async move {
        stop.cancel();
        listener
            .await
            .map_err(|e| ReleaseError::new("event-listener", e.to_string()))
    });

    for adapter in plan.adapters(env.dispatcher) {
        scope.defer_async(format!("adapter:{}", adapter.id()), move || async move {
            adapter.release().await
        });
    }
    scope
}

/// Forwards this run's events (and uncorrelated ones) to the sink set.
///
/// Drains already buffered events before honoring `stop`.
fn spawn_listener(
    mut rx: broadcast::Receiver<Event>,
    sinks: Arc<SinkSet>,
    run_id: Uuid,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => {
                        if ev.run_id.is_none_or(|id| id == run_id) {
                            sinks.emit(&ev);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%run_id, skipped = n, "telemetry listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = stop.cancelled() => break,
            }
        }
    })
}

async fn drive(
    env: &PlanEnv<'_>,
    plan: &Plan<'_>,
    ctx: RunContext,
    seed: &Value,
    opts: &RunOptions,
) -> Vec<DispatchOutcome> {
    let semaphore = opts.permit_limit().map(|n| Arc::new(Semaphore::new(n)));
    let mut driver = Driver::new(plan, ctx, env.bus.clone());
    let mut set: JoinSet<(usize, DispatchOutcome)> = JoinSet::new();

    loop {
        while let Some(&pos) = driver.ready.first() {
            if driver.observe_cancel() {
                break;
            }
            let Some(permit) = acquire(semaphore.as_ref(), &opts.cancel).await else {
                driver.observe_cancel();
                break;
            };
            driver.ready.remove(&pos);

            let def = plan.defs[pos].clone();
            let input = driver.input_for(pos, seed);
            let ctx = driver.ctx.clone();
            let dispatcher = env.dispatcher.clone();
            let queue = opts.publish_outputs.then(|| env.queue.clone());
            let timeout = opts.timeout;

            set.spawn(async move {
                let name = def.name.clone();
                let call = async move {
                    let outcome = dispatcher.run(&def, &input, &ctx, timeout).await;
                    drop(permit);
                    if let (Some(queue), Some(value)) = (queue, outcome.output.as_ref()) {
                        publish_output(&queue, &ctx, &def.name, value).await;
                    }
                    outcome
                };
                let outcome = AssertUnwindSafe(call).catch_unwind().await.unwrap_or_else(|_| {
                    tracing::error!(plugin = %name, "dispatch task panicked");
                    DispatchOutcome::failed(
                        DispatchError::AdapterExecutionFailed {
                            plugin: name,
                            error: "dispatch task panicked".to_owned(),
                        },
                        0,
                        None,
                    )
                });
                (pos, outcome)
            });
        }

        match set.join_next().await {
            None => break,
            Some(Ok((pos, outcome))) => driver.settle(pos, outcome),
            Some(Err(e)) => {
                // Only reachable if the runtime is shutting down; the plugin is left
                // without an outcome and reported as cancelled.
                tracing::error!(error = %e, "dispatch task lost");
            }
        }
    }

    driver.observe_cancel();
    driver.finish()
}

/// Acquires a dispatch permit; `None` if the run is cancelled first.
///
/// `Some(None)` means no concurrency limit.
async fn acquire(
    semaphore: Option<&Arc<Semaphore>>,
    cancel: &CancellationToken,
) -> Option<Option<OwnedSemaphorePermit>> {
    let Some(sem) = semaphore else {
        return Some(None);
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = Arc::clone(sem).acquire_owned() => permit.ok().map(Some),
    }
}

async fn publish_output(queue: &DeliveryQueue, ctx: &RunContext, plugin: &str, value: &Value) {
    let opts = PublishOptions::new()
        .with_attribute("plugin", plugin)
        .with_attribute("run_id", ctx.run_id.to_string());
    if let Err(e) = queue.publish(value.clone(), opts).await {
        tracing::warn!(plugin, error = %e, "plugin output not published");
    }
}
