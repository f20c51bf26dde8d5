//! # Graph Validator
//!
//! Depth-first cycle detection over the dependency relation, run before any initialization
//! side effect. A self-edge is reported as the degenerate cycle `[A, A]`.

use crate::framework::{ServiceError, ServiceId};
use crate::graph::DependencyGraph;
use std::collections::HashSet;

/// Fails with [`ServiceError::CircularDependency`] if a cycle is reachable from `root`.
///
/// The reported cycle starts and ends with the same id, e.g. `[A, B, A]`.
pub fn detect_cycle(graph: &DependencyGraph, root: &ServiceId) -> Result<(), ServiceError> {
    let mut visited = HashSet::new();
    let mut stack = Vec::new();

    match find_cycle(graph, root, &mut visited, &mut stack) {
        Some(cycle) => Err(ServiceError::CircularDependency { cycle }),
        None => Ok(()),
    }
}

fn find_cycle(
    graph: &DependencyGraph,
    node: &ServiceId,
    visited: &mut HashSet<ServiceId>,
    stack: &mut Vec<ServiceId>,
) -> Option<Vec<ServiceId>> {
    if let Some(start) = stack.iter().position(|id| id == node) {
        let mut cycle = stack[start..].to_vec();
        cycle.push(node.clone());
        return Some(cycle);
    }
    if visited.contains(node) {
        return None;
    }
    visited.insert(node.clone());
    stack.push(node.clone());

    for dep in graph.dependencies_of(node) {
        if let Some(cycle) = find_cycle(graph, dep, visited, stack) {
            return Some(cycle);
        }
    }

    stack.pop();
    None
}
