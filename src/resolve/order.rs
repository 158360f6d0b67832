//! # Execution order and topological resolution.
//!
//! [`resolve_order`] performs an iterative depth-first traversal over a
//! [`DependencyGraph`] with explicit `visiting` / `resolved` marks, so deep
//! chains never grow the call stack.
//!
//! ## Rules
//! - Every plugin appears after all of its dependencies.
//! - Re-entering a `visiting` node aborts with [`ResolveError::CycleDetected`].
//! - Reaching an unregistered dependency aborts with [`ResolveError::MissingDependency`].
//! - All-or-nothing: on error no partial order escapes.
//! - Roots and dependency lists are walked in lexicographic order, which makes
//!   the result a pure function of the registry contents.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::plugins::PluginRegistry;

use super::graph::{DependencyGraph, Edge};

/// Topologically valid sequence of plugin names.
///
/// Produced by [`resolve_order`]; immutable afterwards. Hand-built orders
/// (via [`ExecutionOrder::from_names`]) are validated when a run starts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionOrder(Vec<String>);

impl ExecutionOrder {
    /// Wraps names without checking them.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of `name` in the order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ExecutionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<'a> IntoIterator for &'a ExecutionOrder {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Resolved,
}

/// Resolves the registry into an [`ExecutionOrder`].
///
/// # Example
/// ```
/// use plugvisor::{PluginDefinition, PluginRegistry, Stage, resolve_order};
///
/// let mut reg = PluginRegistry::new();
/// reg.register(PluginDefinition::new("C", Stage::Verify).with_dependencies(["A", "B"])).unwrap();
/// reg.register(PluginDefinition::new("B", Stage::Model).with_dependencies(["A"])).unwrap();
/// reg.register(PluginDefinition::new("A", Stage::Discover)).unwrap();
///
/// let order = resolve_order(&reg).unwrap();
/// assert_eq!(order.as_slice(), ["A", "B", "C"]);
/// ```
pub fn resolve_order(registry: &PluginRegistry) -> Result<ExecutionOrder, ResolveError> {
    let graph = DependencyGraph::from_registry(registry);
    let order = topo_sort(&graph).inspect_err(|e| {
        tracing::debug!(error = %e, label = e.as_label(), "resolution failed");
    })?;

    Ok(ExecutionOrder(
        order.into_iter().map(|i| graph.name(i).to_owned()).collect(),
    ))
}

/// Post-order DFS over node indices. Each stack frame is `(node, next_edge)`.
fn topo_sort(graph: &DependencyGraph) -> Result<Vec<usize>, ResolveError> {
    let n = graph.len();
    let mut marks = vec![Mark::Unvisited; n];
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::Visiting;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let edge = graph.edges(node).get(top.1);
            top.1 += 1;

            match edge {
                None => {
                    marks[node] = Mark::Resolved;
                    order.push(node);
                    stack.pop();
                }
                Some(Edge::Missing(to)) => {
                    return Err(ResolveError::MissingDependency {
                        from: graph.name(node).to_owned(),
                        to: to.to_string(),
                    });
                }
                Some(Edge::Node(dep)) => match marks[*dep] {
                    Mark::Resolved => {}
                    Mark::Unvisited => {
                        marks[*dep] = Mark::Visiting;
                        stack.push((*dep, 0));
                    }
                    Mark::Visiting => {
                        let cycle = stack
                            .iter()
                            .skip_while(|(frame, _)| frame != dep)
                            .map(|(frame, _)| graph.name(*frame).to_owned())
                            .collect();
                        return Err(ResolveError::CycleDetected {
                            plugin: graph.name(*dep).to_owned(),
                            cycle,
                        });
                    }
                },
            }
        }
    }

    Ok(order)
}
