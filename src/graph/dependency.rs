//! # Dependency Graph
//!
//! Holds the declared, not yet validated, edges between services. `edges[A] = [B, C]` means
//! A depends on B and C, in the order they were declared.

use crate::framework::ServiceId;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<ServiceId, Vec<ServiceId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or overwrites the dependency set of `id`.
    ///
    /// Declaration order is kept and duplicates are dropped. Self-edges are kept so the
    /// validator can report them.
    pub fn declare<I, D>(&mut self, id: impl Into<ServiceId>, dependencies: I)
    where
        I: IntoIterator<Item = D>,
        D: Into<ServiceId>,
    {
        let mut seen = HashSet::new();
        let deps = dependencies
            .into_iter()
            .map(Into::into)
            .filter(|dep| seen.insert(dep.clone()))
            .collect();
        self.edges.insert(id.into(), deps);
    }

    /// Declared dependencies of `id`. Unknown ids are leaves.
    pub fn dependencies_of(&self, id: &ServiceId) -> &[ServiceId] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_declared(&self, id: &ServiceId) -> bool {
        self.edges.contains_key(id)
    }

    /// Every id that `root` reaches through one or more edges.
    ///
    /// `root` itself is only included when it sits on a cycle.
    pub fn closure(&self, root: &ServiceId) -> HashSet<ServiceId> {
        let mut reached = HashSet::new();
        let mut stack: Vec<&ServiceId> = self.dependencies_of(root).iter().collect();

        while let Some(id) = stack.pop() {
            if reached.insert(id.clone()) {
                stack.extend(self.dependencies_of(id));
            }
        }
        reached
    }
}
