//! # Run context and per-plugin telemetry handle.
//!
//! [`RunContext`] carries run correlation (run id, tenant, workspace, tags),
//! the cancellation token and the clock. [`Telemetry`] is the narrow handle an
//! adapter uses to publish progress notes for the plugin it is executing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::{ClockRef, SystemClock};
use crate::events::{Bus, Event, EventKind};

/// Correlation and control data shared by every dispatch of one run.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub tenant: Option<Arc<str>>,
    pub workspace: Option<Arc<str>>,
    /// Free-form run tags (`runTags`).
    pub tags: BTreeMap<String, String>,
    cancel: CancellationToken,
    clock: ClockRef,
}

impl RunContext {
    /// Creates a context with a fresh run id, system clock and a new token.
    pub fn new() -> Self {
        Self::with_parts(Uuid::new_v4(), CancellationToken::new(), Arc::new(SystemClock))
    }

    pub fn with_parts(run_id: Uuid, cancel: CancellationToken, clock: ClockRef) -> Self {
        Self {
            run_id,
            tenant: None,
            workspace: None,
            tags: BTreeMap::new(),
            cancel,
            clock,
        }
    }

    pub fn with_tenant(mut self, tenant: Option<Arc<str>>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn with_workspace(mut self, workspace: Option<Arc<str>>) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Copy of this context bound to `token` instead of the run token.
    pub(crate) fn with_cancel(&self, token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..self.clone()
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current time according to the kernel clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    pub fn clock(&self) -> &ClockRef {
        &self.clock
    }

    /// New event of `kind` stamped with this run's correlation and clock.
    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_at(self.now()).with_run(
            self.run_id,
            self.tenant.clone(),
            self.workspace.clone(),
        )
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("tenant", &self.tenant)
            .field("workspace", &self.workspace)
            .field("tags", &self.tags)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Telemetry handle scoped to one plugin of one run.
#[derive(Clone)]
pub struct Telemetry {
    bus: Bus,
    ctx: RunContext,
    plugin: Arc<str>,
}

impl Telemetry {
    pub(crate) fn new(bus: Bus, ctx: RunContext, plugin: impl Into<Arc<str>>) -> Self {
        Self {
            bus,
            ctx,
            plugin: plugin.into(),
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Publishes a `PluginProgress` event carrying `note`.
    pub fn note(&self, note: impl Into<Arc<str>>) {
        self.bus.publish(
            self.ctx
                .event(EventKind::PluginProgress)
                .with_plugin(Arc::clone(&self.plugin))
                .with_reason(note),
        );
    }
}
