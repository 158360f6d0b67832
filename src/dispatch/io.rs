//! Plugin input and output payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input handed to an adapter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginInput {
    /// Run-wide input supplied to `run_plan`.
    pub seed: Value,
    /// Outputs of the plugin's direct dependencies, keyed by plugin name.
    #[serde(default)]
    pub upstream: BTreeMap<String, Value>,
}

impl PluginInput {
    pub fn new(seed: Value) -> Self {
        Self {
            seed,
            upstream: BTreeMap::new(),
        }
    }

    pub fn with_upstream(mut self, plugin: impl Into<String>, output: Value) -> Self {
        self.upstream.insert(plugin.into(), output);
        self
    }

    /// Output of dependency `plugin`, if it ran.
    pub fn upstream(&self, plugin: &str) -> Option<&Value> {
        self.upstream.get(plugin)
    }
}

/// Value produced by a successful adapter call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginOutput {
    pub value: Value,
    /// Non-fatal findings; a successful output with warnings counts as `warn`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PluginOutput {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

impl From<Value> for PluginOutput {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
