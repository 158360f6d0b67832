//! # Index-based dependency graph.
//!
//! [`DependencyGraph`] is a read-only view built fresh from a registry for each
//! resolution. Plugin names are interned once into a table; adjacency is stored
//! as index lists, so traversal never hashes strings.
//!
//! Dependencies that are not registered are kept as missing edges and only
//! reported when the traversal reaches them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::plugins::PluginRegistry;

/// Outgoing edge of a node: an interned dependency or an unresolved name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Edge {
    Node(usize),
    Missing(Arc<str>),
}

/// Mapping from plugin to its direct dependencies, stored as index arrays.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    names: Vec<Arc<str>>,
    index: HashMap<Arc<str>, usize>,
    edges: Vec<Vec<Edge>>,
}

impl DependencyGraph {
    /// Builds the graph from the current registry contents.
    ///
    /// Node indices follow the registry's lexicographic name order and each
    /// edge list follows the lexicographic order of the declared dependencies.
    pub fn from_registry(registry: &PluginRegistry) -> Self {
        let names: Vec<Arc<str>> = registry.names().into_iter().map(Arc::from).collect();
        let index: HashMap<Arc<str>, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (Arc::clone(name), i))
            .collect();

        let edges = registry
            .iter()
            .map(|def| {
                def.dependencies
                    .iter()
                    .map(|dep| match index.get(dep.as_str()) {
                        Some(&i) => Edge::Node(i),
                        None => Edge::Missing(Arc::from(dep.as_str())),
                    })
                    .collect()
            })
            .collect();

        Self {
            names,
            index,
            edges,
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of `name`, if it is a node.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Interned name of node `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= self.len()`.
    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    /// Direct dependency names of `name`, including unregistered ones.
    pub fn dependencies(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.index_of(name)?;
        Some(
            self.edges[idx]
                .iter()
                .map(|edge| match edge {
                    Edge::Node(dep) => self.name(*dep),
                    Edge::Missing(dep) => &**dep,
                })
                .collect(),
        )
    }

    /// Owned name → direct dependencies mapping.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.names
            .iter()
            .map(|name| {
                let deps = self
                    .dependencies(name)
                    .unwrap_or_default()
                    .into_iter()
                    .map(str::to_owned)
                    .collect();
                (name.to_string(), deps)
            })
            .collect()
    }

    pub(crate) fn edges(&self, idx: usize) -> &[Edge] {
        &self.edges[idx]
    }
}
