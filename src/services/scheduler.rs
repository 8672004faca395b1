//! Dependency-aware startup and shutdown ordering.
//!
//! Startup order is a topological sort over the dependency graph with ties
//! broken by declaration order, so the sequence is deterministic for a
//! given definitions file. Shutdown order is the reverse: a process is
//! only signaled to stop after everything that depends on it has stopped.

use std::collections::{HashMap, HashSet};

use super::registry::SpecRegistry;

/// Computes deterministic start and stop orderings over a validated
/// registry. The registry is known to be acyclic, so every sort completes.
#[derive(Debug)]
pub struct DependencyScheduler {
    /// Names in declaration order.
    names: Vec<String>,
    /// name -> declaration index, for tie-breaking.
    position: HashMap<String, usize>,
    /// name -> direct dependencies.
    deps: HashMap<String, Vec<String>>,
    /// name -> processes that depend on it.
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyScheduler {
    pub fn new(registry: &SpecRegistry) -> Self {
        let names: Vec<String> = registry.names().map(ToString::to_string).collect();
        let position: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        let mut deps: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for spec in registry.iter() {
            deps.insert(spec.name.clone(), spec.depends_on.clone());
            dependents.entry(spec.name.clone()).or_default();
            for dep in &spec.depends_on {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(spec.name.clone());
            }
        }

        Self {
            names,
            position,
            deps,
            dependents,
        }
    }

    /// Full startup order: Kahn's algorithm with the ready set kept sorted
    /// by declaration index.
    pub fn start_order(&self) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> = self
            .names
            .iter()
            .map(|n| (n.as_str(), self.deps[n].len()))
            .collect();

        let mut ready: Vec<&str> = self
            .names
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree[n] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while !ready.is_empty() {
            // Lowest declaration index first
            ready.sort_by_key(|n| self.position[*n]);
            let node = ready.remove(0);
            order.push(node.to_string());

            for dependent in &self.dependents[node] {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(dependent.as_str());
                    }
                }
            }
        }

        order
    }

    /// Processes whose dependencies are all in `started` and which are not
    /// themselves in `started`, in declaration order. Independent branches
    /// may start in parallel.
    pub fn next_startable(&self, started: &HashSet<String>) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| !started.contains(*n))
            .filter(|n| self.deps[*n].iter().all(|d| started.contains(d)))
            .cloned()
            .collect()
    }

    /// Reverse of the startup order: dependents stop before their
    /// dependencies.
    pub fn shutdown_order(&self) -> Vec<String> {
        let mut order = self.start_order();
        order.reverse();
        order
    }

    /// Direct dependents of `name`.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents.get(name).map_or(&[], Vec::as_slice)
    }

    /// Direct dependencies of `name`.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.deps.get(name).map_or(&[], Vec::as_slice)
    }
}
