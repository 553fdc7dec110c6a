use std::collections::{HashMap, VecDeque};

use crate::module_system::dependency::Dependency;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::manifest::Manifest;
use crate::module_system::registry::ModuleRegistry;

/// Directed graph of module names, `dependent -> dependency`
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Insertion order, used to keep the sort deterministic
    nodes: Vec<String>,
    adj: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str) {
        if !self.adj.contains_key(name) {
            self.nodes.push(name.to_string());
            self.adj.insert(name.to_string(), Vec::new());
        }
    }

    /// Record that `dependent` needs `dependency`. Edges to unknown nodes and
    /// self-edges are ignored.
    pub fn add_edge(&mut self, dependent: &str, dependency: &str) {
        if dependent == dependency || !self.adj.contains_key(dependency) {
            return;
        }
        if let Some(deps) = self.adj.get_mut(dependent) {
            if !deps.iter().any(|d| d == dependency) {
                deps.push(dependency.to_string());
            }
        }
    }

    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.adj.get(name).map_or(&[][..], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Graph over a batch of manifests.
    ///
    /// Named dependencies link to the manifest with that name; category-only
    /// dependencies link to every manifest of that category, since any of
    /// them may end up active.
    pub fn from_manifests(manifests: &[Manifest]) -> Self {
        let mut graph = Self::new();
        for manifest in manifests {
            graph.add_node(&manifest.name);
        }
        for manifest in manifests {
            for dep in &manifest.dependencies {
                for target in manifest_targets(dep, manifests) {
                    graph.add_edge(&manifest.name, target);
                }
            }
        }
        graph
    }

    /// Graph over the initialized modules of a registry, following what each
    /// dependency currently resolves to.
    pub fn from_initialized(registry: &ModuleRegistry) -> Self {
        let mut graph = Self::new();
        let initialized: Vec<_> = registry.iter().filter(|r| r.is_initialized()).collect();
        for record in &initialized {
            graph.add_node(&record.interface().name);
        }
        for record in &initialized {
            for dep in record.interface().effective_dependencies() {
                let target = match (&dep.name, dep.category) {
                    (Some(name), _) => registry.find_by_name(name),
                    (None, Some(category)) => registry.active_id(category),
                    (None, None) => None,
                };
                if let Some(handle) = target.and_then(|id| registry.get(id).ok()) {
                    graph.add_edge(&record.interface().name, &handle.interface.name);
                }
            }
        }
        graph
    }

    /// Kahn's algorithm: dependencies come before their dependents.
    ///
    /// Fails with the names left on a cycle.
    pub fn initialization_order(&self) -> Result<Vec<String>, ModuleSystemError> {
        let mut remaining: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.dependencies_of(n).len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &self.nodes {
            for dep in self.dependencies_of(node) {
                dependents.entry(dep.as_str()).or_default().push(node.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| remaining.get(n).copied() == Some(0))
            .collect();
        let mut sorted = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            sorted.push(node.to_string());
            for dependent in dependents.get(node).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }

        if sorted.len() == self.nodes.len() {
            Ok(sorted)
        } else {
            let cycle = self
                .nodes
                .iter()
                .filter(|n| !sorted.iter().any(|s| s == *n))
                .cloned()
                .collect();
            Err(ModuleSystemError::CyclicDependency(cycle))
        }
    }

    /// Dependents before their dependencies
    pub fn shutdown_order(&self) -> Result<Vec<String>, ModuleSystemError> {
        let mut order = self.initialization_order()?;
        order.reverse();
        Ok(order)
    }
}

fn manifest_targets<'a>(dep: &'a Dependency, manifests: &'a [Manifest]) -> Vec<&'a str> {
    match (&dep.name, dep.category) {
        (Some(name), _) => vec![name.as_str()],
        (None, Some(category)) => manifests
            .iter()
            .filter(|m| m.category == category)
            .map(|m| m.name.as_str())
            .collect(),
        (None, None) => Vec::new(),
    }
}
