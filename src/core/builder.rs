use std::sync::Arc;

use crate::{
    clock::{ClockRef, SystemClock},
    config::Config,
    delivery::DeliveryQueue,
    dispatch::{AdapterRef, AdapterRegistry},
    events::Bus,
    plugins::PluginRegistry,
    sinks::TelemetrySink,
};

use super::orchestrator::Orchestrator;

/// Builder for an [`Orchestrator`] with optional collaborators.
///
/// `build` spawns nothing, so it can run outside a tokio runtime.
pub struct OrchestratorBuilder {
    cfg: Config,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    adapters: AdapterRegistry,
    registry: PluginRegistry,
    clock: Option<ClockRef>,
    queue: Option<DeliveryQueue>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            sinks: Vec::new(),
            adapters: AdapterRegistry::new(),
            registry: PluginRegistry::new(),
            clock: None,
            queue: None,
        }
    }

    /// Sets telemetry sinks.
    ///
    /// Each run starts one worker per sink with its own bounded queue and
    /// closes them during teardown.
    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Adds one telemetry sink.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Registers an adapter (replacing any adapter with the same id).
    pub fn with_adapter(mut self, adapter: AdapterRef) -> Self {
        self.adapters.register(adapter);
        self
    }

    /// Replaces the adapter registry.
    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// Starts from an existing plugin registry.
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Overrides the wall clock (defaults to [`SystemClock`]).
    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Uses an existing delivery queue instead of creating one from
    /// `Config::queue`.
    pub fn with_queue(mut self, queue: DeliveryQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Builds the orchestrator.
    ///
    /// Creates the event bus and, unless one was supplied, a delivery queue
    /// publishing on that bus.
    pub fn build(self) -> Orchestrator {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let queue = self
            .queue
            .unwrap_or_else(|| DeliveryQueue::with_bus(self.cfg.queue.clone(), bus.clone()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Orchestrator::new_internal(
            self.cfg,
            self.registry,
            Arc::new(self.adapters),
            bus,
            self.sinks,
            queue,
            clock,
        )
    }
}
