//! # Retryable in-memory delivery queue.
//!
//! Hands plugin outputs (or any JSON payload) to subscribed handlers with
//! at-least-once semantics per handler.
//!
//! ## Architecture
//! ```text
//! publish(payload, opts)
//!     │  dedupe_key seen recently? ──► return earlier id (deduplicated += 1)
//!     ├─► attempt 1: every handler, registration order (inline)
//!     │       └─ failed handlers ─► retry_count += 1
//!     │                               ├─ retry_count < max_attempts ─► retries (back of queue)
//!     │                               └─ otherwise ──────────────────► dead-lettered
//!     ▼
//! pump task: sleep until due ─► attempt N on the failed handlers only ─► same decision
//! ```
//!
//! Handlers must be idempotent: a message may reach the same handler more
//! than once across retries.

mod handler;
mod message;
mod queue;

pub use handler::{Handler, HandlerFn, HandlerRef, SubscriptionId};
pub use message::{DeliveryMessage, MessageId, PublishOptions};
pub use queue::{DeliveryQueue, QueueConfig, QueueMetrics};
