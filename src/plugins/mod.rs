//! # Plugin catalog.
//!
//! - [`Stage`] - coarse processing phase with a fixed scheduling weight
//! - [`PluginDefinition`] - name, stage, dependencies, adapter id, version, tags
//! - [`PluginRegistry`] - name-keyed store; the source of truth for resolution

mod definition;
mod registry;
mod stage;

pub use definition::PluginDefinition;
pub use registry::PluginRegistry;
pub use stage::{ParseStageError, Stage};
