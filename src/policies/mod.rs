//! Retry delay policies for the delivery queue.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid thundering herd
//!
//! ## Quick wiring
//! ```text
//! QueueConfig { max_attempts, backoff: BackoffPolicy, dedupe_window }
//!      └─► delivery::DeliveryQueue uses:
//!           - max_attempts to decide retry vs dead-letter
//!           - backoff.next(retry_count - 1) to schedule the next attempt
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=30s, jitter=None.
//! - `JitterPolicy::None` by default; `Additive { ratio }` only ever lengthens a delay.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
