//! Validated, immutable registry of process definitions.

use std::collections::{HashMap, HashSet};

use crate::domain::errors::ConfigError;
use crate::domain::models::ProcessSpec;

/// Immutable set of validated [`ProcessSpec`]s, keyed by name but keeping
/// declaration order. Safe to share behind an `Arc`; read-only after load.
#[derive(Debug)]
pub struct SpecRegistry {
    specs: Vec<ProcessSpec>,
    index: HashMap<String, usize>,
}

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util(
    node: &str,
    graph: &HashMap<&str, Vec<&str>>,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> bool {
    visited.insert(node.to_string());
    rec_stack.insert(node.to_string());
    path.push(node.to_string());

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                // Cycle detected; trim the path to the loop itself
                if let Some(cycle_start) = path.iter().position(|n| n == neighbor) {
                    path.drain(0..cycle_start);
                    path.push(neighbor.to_string());
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl SpecRegistry {
    /// Validate and freeze a set of process definitions.
    ///
    /// Fails on duplicate names, empty commands, self or unknown
    /// dependencies, non-sensical restart multipliers, and dependency
    /// cycles.
    pub fn load(specs: Vec<ProcessSpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::NoProcesses);
        }

        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if spec.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand(spec.name.clone()));
            }
            if spec.restart.multiplier < 1.0 {
                return Err(ConfigError::InvalidMultiplier {
                    process: spec.name.clone(),
                    multiplier: spec.restart.multiplier,
                });
            }
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateName(spec.name.clone()));
            }
        }

        for spec in &specs {
            for dep in &spec.depends_on {
                if dep == &spec.name {
                    return Err(ConfigError::SelfDependency(spec.name.clone()));
                }
                if !index.contains_key(dep) {
                    return Err(ConfigError::UnknownDependency {
                        process: spec.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = Self::detect_cycle(&specs) {
            return Err(ConfigError::DependencyCycle(cycle));
        }

        Ok(Self { specs, index })
    }

    /// DFS-based cycle detection over the dependency graph.
    fn detect_cycle(specs: &[ProcessSpec]) -> Option<Vec<String>> {
        let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
        for spec in specs {
            graph
                .entry(spec.name.as_str())
                .or_default()
                .extend(spec.depends_on.iter().map(String::as_str));
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for spec in specs {
            if !visited.contains(&spec.name)
                && detect_cycle_util(&spec.name, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path);
            }
        }

        None
    }

    pub fn get(&self, name: &str) -> Result<&ProcessSpec, ConfigError> {
        self.index
            .get(name)
            .map(|&i| &self.specs[i])
            .ok_or_else(|| ConfigError::UnknownProcess(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Specs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessSpec> {
        self.specs.iter()
    }

    /// Names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
