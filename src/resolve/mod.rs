//! # Dependency resolution.
//!
//! Turns a [`PluginRegistry`](crate::PluginRegistry) into an [`ExecutionOrder`].
//!
//! ```text
//! PluginRegistry ──► DependencyGraph::from_registry()   (names interned once,
//!                         │                              edges as indices)
//!                         ▼
//!                    resolve_order()  ── iterative DFS, "visiting" + "resolved"
//!                         │
//!                         ├─ Ok(ExecutionOrder)         dependencies strictly earlier
//!                         ├─ Err(CycleDetected)         names the re-entered plugin
//!                         └─ Err(MissingDependency)     names dependent + missing name
//! ```
//!
//! Resolution is deterministic: roots are visited in lexicographic order and
//! each plugin's dependencies are visited in lexicographic order, so an
//! unchanged registry always yields the same order.

mod graph;
mod order;

pub use graph::DependencyGraph;
pub use order::{ExecutionOrder, resolve_order};
