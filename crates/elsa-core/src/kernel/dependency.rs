use std::collections::{HashMap, HashSet};

use crate::kernel::definition::{CapabilityKey, ComponentDefinition};
use crate::kernel::error::{Error, Result};

/// One resolved requirement edge: `component` needs `capability` from `provider`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub capability: CapabilityKey,
    pub provider: String,
}

/// Dependency graph over discovered component definitions.
///
/// Nodes are definition ids in registration order. Each node's requirements
/// are bound to exactly one provider when the graph is resolved.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    // component id -> bindings, in the order its requirements were declared
    edges: HashMap<String, Vec<Binding>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl DependencyGraph {
    /// Resolve every requirement of `definitions` against the capabilities
    /// the same set provides.
    ///
    /// A requirement with no provider is an [`Error::UnsatisfiedDependency`].
    /// Several providers are an [`Error::AmbiguousDependency`] unless exactly
    /// one of them is marked primary.
    pub fn resolve(definitions: &[&ComponentDefinition]) -> Result<Self> {
        let mut providers: HashMap<CapabilityKey, Vec<&ComponentDefinition>> = HashMap::new();
        for def in definitions {
            for key in def.provided() {
                providers.entry(*key).or_default().push(*def);
            }
        }

        let mut nodes = Vec::with_capacity(definitions.len());
        let mut edges = HashMap::new();
        for def in definitions {
            let mut bindings = Vec::with_capacity(def.required().len());
            for key in def.required() {
                let candidates = providers.get(key).map(Vec::as_slice).unwrap_or_default();
                let provider = Self::select_provider(def.id(), key, candidates)?;
                bindings.push(Binding {
                    capability: *key,
                    provider: provider.to_string(),
                });
            }
            nodes.push(def.id().to_string());
            edges.insert(def.id().to_string(), bindings);
        }

        let graph = Self { nodes, edges };
        if let Some(path) = graph.find_cycle() {
            return Err(Error::DependencyCycle { path });
        }
        Ok(graph)
    }

    fn select_provider<'d>(
        component: &str,
        key: &CapabilityKey,
        candidates: &[&'d ComponentDefinition],
    ) -> Result<&'d str> {
        match candidates {
            [] => Err(Error::UnsatisfiedDependency {
                component: component.to_string(),
                capability: key.name().to_string(),
            }),
            [only] => {
                let only: &'d ComponentDefinition = *only;
                Ok(only.id())
            }
            many => {
                let primaries: Vec<&'d ComponentDefinition> =
                    many.iter().copied().filter(|d| d.is_primary()).collect();
                if primaries.len() == 1 {
                    let primary = primaries[0];
                    log::debug!(
                        "Capability '{}' for '{}' resolved to primary provider '{}'",
                        key,
                        component,
                        primary.id()
                    );
                    Ok(primary.id())
                } else {
                    Err(Error::AmbiguousDependency {
                        component: component.to_string(),
                        capability: key.name().to_string(),
                        candidates: many.iter().map(|d| d.id().to_string()).collect(),
                    })
                }
            }
        }
    }

    /// Check if the graph contains a node
    pub fn contains(&self, node_id: &str) -> bool {
        self.edges.contains_key(node_id)
    }

    /// Bindings of a node, in declaration order.
    pub fn bindings_of(&self, node_id: &str) -> &[Binding] {
        self.edges.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Ids of the providers a node depends on.
    pub fn dependencies_of(&self, node_id: &str) -> Vec<String> {
        self.bindings_of(node_id)
            .iter()
            .map(|b| b.provider.clone())
            .collect()
    }

    /// Returns the first cycle found as a path that starts and ends with the
    /// same id.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if !marks.contains_key(node.as_str()) {
                if let Some(path) = self.cycle_dfs(node, &mut marks, &mut stack) {
                    return Some(path);
                }
            }
        }
        None
    }

    fn cycle_dfs<'g>(
        &'g self,
        node: &'g str,
        marks: &mut HashMap<&'g str, Mark>,
        stack: &mut Vec<&'g str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Visiting);
        stack.push(node);
        for binding in self.bindings_of(node) {
            let dep = binding.provider.as_str();
            match marks.get(dep) {
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == dep).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|n| n.to_string()).collect();
                    path.push(dep.to_string());
                    return Some(path);
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(path) = self.cycle_dfs(dep, marks, stack) {
                        return Some(path);
                    }
                }
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    /// Topological order with dependencies before dependents.
    ///
    /// Deterministic: nodes are visited in registration order and each node's
    /// dependencies in declaration order.
    pub fn instantiation_order(&self) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            self.visit_topsort(node, &mut visited, &mut order);
        }
        order
    }

    /// DFS for topological sort
    fn visit_topsort<'g>(
        &'g self,
        node: &'g str,
        visited: &mut HashSet<&'g str>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(node) {
            return;
        }
        for binding in self.bindings_of(node) {
            self.visit_topsort(&binding.provider, visited, order);
        }
        order.push(node.to_string());
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
