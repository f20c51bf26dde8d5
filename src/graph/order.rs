//! # Order Resolver
//!
//! Produces the initialization sequence for the transitive closure of a service: a depth-first
//! post-order over dependencies visited in declaration order. Every id appears after all of its
//! dependencies and the requested service comes last.

use crate::framework::{ServiceError, ServiceId};
use crate::graph::{detect_cycle, DependencyGraph};
use std::collections::HashSet;

/// Initialization order for `root`, ending with `root`.
///
/// Fails closed with [`ServiceError::CircularDependency`]; no partial order is returned.
pub fn resolve_order(
    graph: &DependencyGraph,
    root: &ServiceId,
) -> Result<Vec<ServiceId>, ServiceError> {
    detect_cycle(graph, root)?;

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    post_order(graph, root, &mut visited, &mut order);
    Ok(order)
}

fn post_order(
    graph: &DependencyGraph,
    node: &ServiceId,
    visited: &mut HashSet<ServiceId>,
    order: &mut Vec<ServiceId>,
) {
    if !visited.insert(node.clone()) {
        return;
    }
    for dep in graph.dependencies_of(node) {
        post_order(graph, dep, visited, order);
    }
    order.push(node.clone());
}
