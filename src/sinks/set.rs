//! # Non-blocking event fan-out to multiple sinks.
//!
//! [`SinkSet`] distributes events to multiple sinks without blocking the
//! publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► sink1.on_event()
//!     │    (bounded)         └──────► panic → SinkPanicked
//!     ├──► [queue 2] ──► worker 2 ──► sink2.on_event()
//!     └──► [queue N] ──► worker N ──► sinkN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-sink ordering**: sink A may process event N while B processes N+5
//! - **Overflow**: event dropped for that sink only, `SinkOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Per-sink FIFO**: each sink sees events in emit order
//! - **Close**: [`SinkSet::close`] drops the queues and waits for workers to drain
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state
//! inconsistent if a sink panics while holding a lock.

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};

use super::TelemetrySink;

/// Per-sink channel metadata.
struct SinkChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for telemetry sinks.
pub struct SinkSet {
    channels: Mutex<Vec<SinkChannel>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    bus: Bus,
}

impl SinkSet {
    /// Creates a new set and spawns one worker task per sink.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(sinks.len());
        let mut workers = Vec::with_capacity(sinks.len());

        for sink in sinks {
            let cap = sink.queue_capacity().max(1);
            let name = sink.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let bus_for_worker = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sink.on_event(ev.as_ref());

                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        tracing::warn!(sink = sink.name(), info = %info, "telemetry sink panicked");
                        bus_for_worker.publish(Event::sink_panicked(sink.name(), info));
                    }
                }
            });
            channels.push(SinkChannel { name, sender: tx });
            workers.push(handle);
        }

        Self {
            channels: Mutex::new(channels),
            workers: Mutex::new(workers),
            bus,
        }
    }

    /// Emits an event to all sinks (clones the event once).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all sinks.
    ///
    /// Overflow events are not re-published when they themselves overflow.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow_evt = matches!(event.kind, EventKind::SinkOverflow);
        let channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());

        for channel in channels.iter() {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                tracing::warn!(sink = channel.name, reason, "telemetry sink dropped event");
                self.bus.publish(Event::sink_overflow(channel.name, reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to drain them.
    ///
    /// Idempotent: later calls find nothing to close.
    pub async fn close(&self) {
        let workers = {
            self.channels
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clear();
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(|p| p.into_inner()))
        };

        for h in workers {
            let _ = h.await;
        }
    }

    /// Number of open sink queues.
    pub fn len(&self) -> usize {
        self.channels.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl TelemetrySink for Counter {
        async fn on_event(&self, _event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct Panicker;

    #[async_trait]
    impl TelemetrySink for Panicker {
        async fn on_event(&self, _event: &Event) {
            panic!("sink exploded");
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    #[tokio::test]
    async fn close_drains_queued_events() {
        let bus = Bus::new(16);
        let counter = Arc::new(Counter::default());
        let set = SinkSet::new(vec![counter.clone()], bus);

        for _ in 0..5 {
            set.emit(&Event::new(EventKind::PluginStarted));
        }
        set.close().await;

        assert_eq!(counter.seen.load(Ordering::SeqCst), 5);
        assert!(set.is_empty());
        set.close().await;
    }

    #[tokio::test]
    async fn panics_are_isolated_and_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let counter = Arc::new(Counter::default());
        let set = SinkSet::new(vec![Arc::new(Panicker), counter.clone()], bus);

        set.emit(&Event::new(EventKind::RunStarted));
        set.close().await;

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SinkPanicked);
        assert_eq!(ev.resource.as_deref(), Some("panicker"));
        assert_eq!(ev.reason.as_deref(), Some("sink exploded"));
        assert_eq!(counter.seen.load(Ordering::SeqCst), 1);
    }
}
