//! # Scoped resource lifecycle.
//!
//! A [`Scope`] is a LIFO stack of release operations. Every run executes inside
//! exactly one scope; closing it releases what the run acquired (sink workers,
//! the bus listener, adapter connections) in reverse acquisition order.
//!
//! ```text
//! acquire:  sinks ─► listener ─► adapter A ─► adapter B
//! release:  adapter B ─► adapter A ─► listener ─► sinks
//!              │ fails        │ still runs
//!              └──────────────┴──► ScopeError { failures: [B] }
//! ```

mod resource;
mod stack;

pub use resource::Resource;
pub use stack::Scope;
