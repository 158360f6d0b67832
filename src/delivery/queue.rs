//! # Delivery queue with bounded retries.
//!
//! [`DeliveryQueue`] delivers every published message to the handlers
//! registered at publish time. The first attempt runs inline in
//! [`DeliveryQueue::publish`]; retries of failed handlers run on a background
//! pump task spawned on first use.
//!
//! ## Rules
//! - `max_attempts` bounds the **total** attempts per message (0 behaves as 1).
//! - Retry `n` (1-based) waits `backoff.next(n - 1)`.
//! - Retries go to the back of the queue; they do not keep their original
//!   position relative to fresh messages.
//! - Only handlers that failed are retried; a handler unsubscribed in the
//!   meantime is dropped from the retry.
//! - A handler panic counts as a failed attempt.
//! - Exhaustion is never reported to the publisher; it is counted in
//!   `dead_lettered`, logged, and emitted as `MessageDeadLettered`.
//!
//! Queue state and metrics sit behind separate mutexes that are never held
//! across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{DeliveryError, HandlerError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, JitterPolicy};

use super::handler::{HandlerRef, SubscriptionId};
use super::message::{DeliveryMessage, MessageId, PublishOptions};

/// Delivery queue settings.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueConfig {
    /// Total delivery attempts per message and handler (0 behaves as 1).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
    /// Number of recent dedupe keys remembered (0 disables dedupe).
    pub dedupe_window: usize,
}

impl Default for QueueConfig {
    /// `max_attempts = 3`, backoff 100ms doubling up to 30s with 10% additive
    /// jitter, `dedupe_window = 1024`.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy {
                jitter: JitterPolicy::Additive { ratio: 0.1 },
                ..BackoffPolicy::default()
            },
            dedupe_window: 1024,
        }
    }
}

impl QueueConfig {
    /// Effective attempt budget.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Snapshot of queue counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct QueueMetrics {
    /// Messages accepted (deduplicated publishes excluded).
    pub seen: u64,
    /// Messages delivered to every targeted handler.
    pub delivered: u64,
    /// Messages being delivered or waiting for a retry.
    pub in_flight: u64,
    /// Retries scheduled.
    pub retried: u64,
    /// Messages abandoned after exhausting their budget (or on close).
    pub dead_lettered: u64,
    /// Publishes collapsed by dedupe key.
    pub deduplicated: u64,
    /// Mean duration of one handler call.
    pub average_process_ms: f64,
}

#[derive(Default)]
struct MetricsState {
    snapshot: QueueMetrics,
    process_total_ms: f64,
    process_samples: u64,
}

struct PendingRetry {
    message: DeliveryMessage,
    targets: Vec<SubscriptionId>,
    due: Instant,
}

#[derive(Default)]
struct State {
    handlers: Vec<(SubscriptionId, HandlerRef)>,
    dedupe: HashMap<String, MessageId>,
    dedupe_order: VecDeque<String>,
    retries: VecDeque<PendingRetry>,
}

struct Inner {
    cfg: QueueConfig,
    state: Mutex<State>,
    metrics: Mutex<MetricsState>,
    next_subscription: AtomicU64,
    notify: Arc<Notify>,
    closed: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
    bus: Option<Bus>,
}

/// In-memory, at-least-once delivery queue.
///
/// Cheap to clone; clones share the same queue.
///
/// # Example
/// ```
/// use plugvisor::{DeliveryMessage, DeliveryQueue, HandlerError, HandlerFn, PublishOptions, QueueConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = DeliveryQueue::new(QueueConfig::default());
/// queue.subscribe(HandlerFn::arc("print", |msg: DeliveryMessage| async move {
///     println!("{}", msg.payload);
///     Ok::<_, HandlerError>(())
/// }));
///
/// let id = queue.publish(serde_json::json!({"ok": true}), PublishOptions::new()).await.unwrap();
/// assert_eq!(queue.metrics().delivered, 1);
/// # let _ = id;
/// queue.close().await;
/// # }
/// ```
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<Inner>,
}

impl DeliveryQueue {
    pub fn new(cfg: QueueConfig) -> Self {
        Self::build(cfg, None)
    }

    /// Queue that also publishes delivery events on `bus`.
    pub fn with_bus(cfg: QueueConfig, bus: Bus) -> Self {
        Self::build(cfg, Some(bus))
    }

    fn build(cfg: QueueConfig, bus: Option<Bus>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                state: Mutex::new(State::default()),
                metrics: Mutex::new(MetricsState::default()),
                next_subscription: AtomicU64::new(1),
                notify: Arc::new(Notify::new()),
                closed: CancellationToken::new(),
                pump: Mutex::new(None),
                bus,
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.cfg
    }

    /// Registers `handler`; it receives messages published from now on.
    pub fn subscribe(&self, handler: HandlerRef) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(subscription = %id, handler = handler.name(), "handler subscribed");
        self.inner.state().handlers.push((id, handler));
        id
    }

    /// Removes a subscription. Pending retries for it are dropped.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.state();
        let before = state.handlers.len();
        state.handlers.retain(|(sid, _)| *sid != id);
        before != state.handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state().handlers.len()
    }

    /// Publishes `payload` and runs the first delivery attempt.
    ///
    /// Returns the message id (the earlier id for a deduplicated publish), or
    /// [`DeliveryError::Closed`] after [`close`](Self::close).
    pub async fn publish(
        &self,
        payload: Value,
        opts: PublishOptions,
    ) -> Result<MessageId, DeliveryError> {
        if self.inner.closed.is_cancelled() {
            return Err(DeliveryError::Closed);
        }

        let PublishOptions {
            dedupe_key,
            priority,
            mut attributes,
        } = opts;
        let id = Uuid::new_v4();

        let targets = {
            let mut state = self.inner.state();
            if let Some(key) = dedupe_key.filter(|_| self.inner.cfg.dedupe_window > 0) {
                if let Some(prev) = state.dedupe.get(&key).copied() {
                    self.inner.metrics().snapshot.deduplicated += 1;
                    tracing::debug!(message_id = %prev, dedupe_key = %key, "publish deduplicated");
                    return Ok(prev);
                }
                state.remember(key, id, self.inner.cfg.dedupe_window);
            }
            state.handlers.clone()
        };

        if let Some(p) = priority {
            attributes.insert("priority".to_owned(), p.to_string());
        }
        let message = DeliveryMessage {
            id,
            payload,
            retry_count: 0,
            attributes,
        };

        {
            let mut m = self.inner.metrics();
            m.snapshot.seen += 1;
            m.snapshot.in_flight += 1;
        }
        self.inner.emit(Event::new(EventKind::MessagePublished).with_message(id));

        let failed = self.inner.attempt(&message, targets).await;
        self.inner.settle(message, failed);
        Ok(id)
    }

    /// Current counters.
    pub fn metrics(&self) -> QueueMetrics {
        self.inner.metrics().snapshot
    }

    /// Number of messages waiting for a retry.
    pub fn pending_retries(&self) -> usize {
        self.inner.state().retries.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Stops the pump. Pending retries are dropped and counted as dead-lettered.
    ///
    /// Idempotent. Publishing afterwards fails with [`DeliveryError::Closed`].
    pub async fn close(&self) {
        self.inner.closed.cancel();
        let pump = self.inner.pump.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = pump {
            let _ = handle.await;
        }

        let dropped: Vec<PendingRetry> = self.inner.state().retries.drain(..).collect();
        for retry in dropped {
            self.inner.dead_letter(&retry.message, "queue closed");
        }
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("cfg", &self.inner.cfg)
            .field("metrics", &self.metrics())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl State {
    fn remember(&mut self, key: String, id: MessageId, window: usize) {
        while self.dedupe_order.len() >= window {
            match self.dedupe_order.pop_front() {
                Some(old) => {
                    self.dedupe.remove(&old);
                }
                None => break,
            }
        }
        self.dedupe.insert(key.clone(), id);
        self.dedupe_order.push_back(key);
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn metrics(&self) -> MutexGuard<'_, MetricsState> {
        self.metrics.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn emit(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }

    /// Runs one attempt against `targets` in order; returns the ids that failed.
    async fn attempt(
        &self,
        message: &DeliveryMessage,
        targets: Vec<(SubscriptionId, HandlerRef)>,
    ) -> Vec<SubscriptionId> {
        let mut failed = Vec::new();

        for (sid, handler) in targets {
            let started = Instant::now();
            let res = std::panic::AssertUnwindSafe(handler.handle(message))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(HandlerError::new("handler panicked")));
            self.record_process_time(started);

            if let Err(err) = res {
                tracing::debug!(
                    message_id = %message.id,
                    handler = handler.name(),
                    attempt = message.attempt(),
                    error = %err,
                    "delivery attempt failed"
                );
                self.emit(
                    Event::new(EventKind::DeliveryFailed)
                        .with_message(message.id)
                        .with_resource(handler.name())
                        .with_attempt(message.attempt())
                        .with_reason(err.to_string()),
                );
                failed.push(sid);
            }
        }
        failed
    }

    fn record_process_time(&self, started: Instant) {
        let ms = started.elapsed().as_secs_f64() * 1_000.0;
        let mut m = self.metrics();
        m.process_total_ms += ms;
        m.process_samples += 1;
        m.snapshot.average_process_ms = m.process_total_ms / m.process_samples as f64;
    }

    /// Decides what happens to `message` after an attempt.
    fn settle(self: &Arc<Self>, mut message: DeliveryMessage, failed: Vec<SubscriptionId>) {
        if failed.is_empty() {
            let mut m = self.metrics();
            m.snapshot.delivered += 1;
            m.snapshot.in_flight = m.snapshot.in_flight.saturating_sub(1);
            return;
        }

        let failed_attempt = message.attempt();
        message.retry_count = failed_attempt;

        if failed_attempt >= self.cfg.attempts() {
            let err = DeliveryError::DeliveryExhausted {
                id: message.id,
                attempts: failed_attempt,
            };
            self.dead_letter(&message, &err.to_string());
            return;
        }
        if self.closed.is_cancelled() {
            self.dead_letter(&message, "queue closed");
            return;
        }

        let delay = self.cfg.backoff.next(failed_attempt - 1);
        tracing::debug!(
            message_id = %message.id,
            attempt = failed_attempt,
            delay_ms = delay.as_millis() as u64,
            handlers = failed.len(),
            "retry scheduled"
        );
        self.emit(
            Event::new(EventKind::RetryScheduled)
                .with_message(message.id)
                .with_attempt(failed_attempt)
                .with_delay(delay),
        );
        self.metrics().snapshot.retried += 1;
        self.state().retries.push_back(PendingRetry {
            message,
            targets: failed,
            due: Instant::now() + delay,
        });
        self.ensure_pump();
        self.notify.notify_one();
    }

    fn dead_letter(&self, message: &DeliveryMessage, reason: &str) {
        tracing::warn!(
            message_id = %message.id,
            attempts = message.retry_count,
            reason,
            "message dead-lettered"
        );
        self.emit(
            Event::new(EventKind::MessageDeadLettered)
                .with_message(message.id)
                .with_attempt(message.retry_count)
                .with_reason(reason),
        );
        let mut m = self.metrics();
        m.snapshot.dead_lettered += 1;
        m.snapshot.in_flight = m.snapshot.in_flight.saturating_sub(1);
    }

    fn ensure_pump(self: &Arc<Self>) {
        let mut pump = self.pump.lock().unwrap_or_else(|p| p.into_inner());
        if pump.is_none() && !self.closed.is_cancelled() {
            *pump = Some(tokio::spawn(run_pump(
                Arc::downgrade(self),
                Arc::clone(&self.notify),
                self.closed.clone(),
            )));
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.state().retries.iter().map(|r| r.due).min()
    }

    /// Removes due retries, keeping queue order.
    fn take_due(&self, now: Instant) -> Vec<PendingRetry> {
        let mut state = self.state();
        let (due, waiting): (VecDeque<_>, VecDeque<_>) =
            state.retries.drain(..).partition(|r| r.due <= now);
        state.retries = waiting;
        due.into()
    }

    async fn retry(self: &Arc<Self>, pending: PendingRetry) {
        let targets: Vec<(SubscriptionId, HandlerRef)> = {
            let state = self.state();
            state
                .handlers
                .iter()
                .filter(|(sid, _)| pending.targets.contains(sid))
                .cloned()
                .collect()
        };
        let failed = self.attempt(&pending.message, targets).await;
        self.settle(pending.message, failed);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Background retry loop. Holds only a weak reference so dropping the last
/// queue handle stops it.
async fn run_pump(inner: Weak<Inner>, notify: Arc<Notify>, closed: CancellationToken) {
    loop {
        if closed.is_cancelled() {
            return;
        }
        let next_due = match inner.upgrade() {
            Some(q) => q.next_due(),
            None => return,
        };

        match next_due {
            None => {
                tokio::select! {
                    _ = closed.cancelled() => return,
                    _ = notify.notified() => continue,
                }
            }
            Some(due) => {
                tokio::select! {
                    _ = closed.cancelled() => return,
                    _ = notify.notified() => continue,
                    _ = time::sleep_until(due) => {}
                }
            }
        }

        let Some(q) = inner.upgrade() else { return };
        for pending in q.take_due(Instant::now()) {
            q.retry(pending).await;
        }
    }
}
