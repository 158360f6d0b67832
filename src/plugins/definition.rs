//! # Plugin definitions.
//!
//! A [`PluginDefinition`] describes one unit of work: its unique name, its
//! [`Stage`], the names it depends on, and which adapter executes it.
//! Definitions are plain data; they carry no behavior of their own.
//!
//! ## Example
//! ```rust
//! use plugvisor::{PluginDefinition, Stage};
//!
//! let def = PluginDefinition::new("report", Stage::Archive)
//!     .with_dependencies(["collect", "score"])
//!     .with_adapter("s3")
//!     .with_version("1.2.0")
//!     .with_tag("billing");
//!
//! assert_eq!(def.adapter_id(), "s3");
//! assert!(def.dependencies.contains("score"));
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::stage::Stage;

/// Declarative description of a plugin.
///
/// `dependencies` and `tags` are ordered sets, so iteration is deterministic
/// and duplicates collapse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDefinition {
    /// Unique key within a registry.
    pub name: String,
    /// Processing phase (scheduling weight only).
    pub stage: Stage,
    /// Names that must complete successfully before this plugin runs.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Adapter id; `None` means "same as `name`".
    #[serde(default)]
    pub adapter: Option<String>,
    /// Free-form version string.
    #[serde(default = "default_version")]
    pub version: String,
    /// Free-form labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

impl PluginDefinition {
    /// Creates a definition with no dependencies.
    pub fn new(name: impl Into<String>, stage: Stage) -> Self {
        Self {
            name: name.into(),
            stage,
            dependencies: BTreeSet::new(),
            adapter: None,
            version: default_version(),
            tags: BTreeSet::new(),
        }
    }

    /// Adds dependency names.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Sets the adapter id.
    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adapter id used for dispatch.
    pub fn adapter_id(&self) -> &str {
        self.adapter.as_deref().unwrap_or(&self.name)
    }

    /// Scheduling rank: stage weight plus dependency count.
    pub fn rank(&self) -> u32 {
        let deps = u32::try_from(self.dependencies.len()).unwrap_or(u32::MAX);
        self.stage.weight().saturating_add(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_defaults_to_name() {
        let def = PluginDefinition::new("ingest", Stage::Discover);
        assert_eq!(def.adapter_id(), "ingest");
    }

    #[test]
    fn duplicate_dependencies_collapse() {
        let def = PluginDefinition::new("c", Stage::Execute).with_dependencies(["a", "b", "a"]);
        assert_eq!(def.dependencies.len(), 2);
        assert_eq!(def.rank(), 3 + 2);
    }

    #[test]
    fn deserializes_with_defaults() {
        let def: PluginDefinition =
            serde_json::from_str(r#"{"name":"x","stage":"verify"}"#).unwrap();
        assert_eq!(def.stage, Stage::Verify);
        assert!(def.dependencies.is_empty());
        assert_eq!(def.version, "0.0.0");
    }
}
