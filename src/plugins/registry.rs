//! # Plugin registry.
//!
//! [`PluginRegistry`] stores definitions by name and is the single source of
//! truth for resolution; graphs are views derived from it on demand.
//!
//! ## Rules
//! - Names are unique: a second `register` with the same name fails with
//!   [`ResolveError::DuplicateName`] and leaves the registry unchanged.
//! - Dependency names are **not** checked at register time, plugins may be
//!   registered before their dependencies. Validation happens in
//!   [`resolve_order`](crate::resolve_order).
//! - Iteration and [`names`](PluginRegistry::names) are lexicographic.
//!
//! The registry is an explicit value owned by the caller (usually the
//! [`Orchestrator`](crate::Orchestrator)); there is no process-wide catalog.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ResolveError;

use super::definition::PluginDefinition;

/// Name-keyed store of plugin definitions.
#[derive(Clone, Debug, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginDefinition>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition.
    ///
    /// Fails with [`ResolveError::DuplicateName`] if the name is taken.
    pub fn register(&mut self, definition: PluginDefinition) -> Result<(), ResolveError> {
        if self.plugins.contains_key(&definition.name) {
            return Err(ResolveError::DuplicateName {
                name: definition.name,
            });
        }
        tracing::trace!(plugin = %definition.name, stage = %definition.stage, "plugin registered");
        self.plugins.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Registers several definitions, stopping at the first duplicate.
    ///
    /// Definitions before the duplicate stay registered.
    pub fn register_all<I>(&mut self, definitions: I) -> Result<(), ResolveError>
    where
        I: IntoIterator<Item = PluginDefinition>,
    {
        definitions.into_iter().try_for_each(|def| self.register(def))
    }

    /// Removes a definition, returning it if it was present.
    pub fn unregister(&mut self, name: &str) -> Option<PluginDefinition> {
        self.plugins.remove(name)
    }

    /// Looks up a definition by name.
    pub fn get(&self, name: &str) -> Option<&PluginDefinition> {
        self.plugins.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Returns all registered names in lexicographic order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    /// Declared dependencies of `name`, or `None` if it is not registered.
    pub fn dependencies_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.plugins.get(name).map(|def| &def.dependencies)
    }

    /// Iterates definitions in lexicographic name order.
    pub fn iter(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.plugins.values()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
