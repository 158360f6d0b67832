//! # Name-keyed adapter registry.
//!
//! Plugins reference adapters by id (see
//! [`PluginDefinition::adapter_id`](crate::PluginDefinition::adapter_id)).
//! Registering an adapter under an existing id replaces it.

use std::collections::HashMap;
use std::sync::Arc;

use super::adapter::{Adapter, AdapterRef};

/// Adapters keyed by [`Adapter::id`].
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, AdapterRef>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter`, returning the adapter it replaced (if any).
    pub fn register(&mut self, adapter: AdapterRef) -> Option<AdapterRef> {
        let id = adapter.id().to_owned();
        let prev = self.adapters.insert(id.clone(), adapter);
        if prev.is_some() {
            tracing::debug!(adapter = %id, "adapter replaced");
        }
        prev
    }

    pub fn remove(&mut self, id: &str) -> Option<AdapterRef> {
        self.adapters.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<AdapterRef> {
        self.adapters.get(id).map(Arc::clone)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adapters.contains_key(id)
    }

    /// Registered ids in lexicographic order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl FromIterator<AdapterRef> for AdapterRegistry {
    fn from_iter<I: IntoIterator<Item = AdapterRef>>(iter: I) -> Self {
        let mut reg = Self::new();
        for adapter in iter {
            reg.register(adapter);
        }
        reg
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry").field("ids", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{AdapterCall, AdapterFn, PluginOutput};
    use crate::error::AdapterError;

    fn noop(id: &'static str) -> AdapterRef {
        AdapterFn::arc(id, |_call: AdapterCall| async {
            Ok::<_, AdapterError>(PluginOutput::default())
        })
    }

    #[test]
    fn register_replaces_same_id() {
        let mut reg = AdapterRegistry::new();
        assert!(reg.register(noop("http")).is_none());
        assert!(reg.register(noop("http")).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn ids_are_sorted() {
        let reg: AdapterRegistry = [noop("sql"), noop("http"), noop("grpc")].into_iter().collect();
        assert_eq!(reg.ids(), vec!["grpc", "http", "sql"]);
        assert!(reg.contains("sql"));
        assert!(reg.get("smtp").is_none());
    }
}
