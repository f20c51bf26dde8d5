//! Process-wide map from [`ServiceId`] to its [`ServiceDescriptor`], plus the declared
//! dependency graph.
//!
//! A descriptor is created the first time an id is mentioned, by registration, by a
//! declaration or as someone's dependency, and lives as long as the registry.

use crate::framework::error::ServiceError;
use crate::framework::service::Routine;
use crate::framework::ServiceId;
use crate::graph::{self, DependencyGraph};
use crate::lifecycle::descriptor::ServiceDescriptor;
use crate::lifecycle::path::InitPath;
use crate::lifecycle::state::{ServiceState, ServiceStatus};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Default)]
pub(crate) struct Registry {
    descriptors: RwLock<HashMap<ServiceId, Arc<ServiceDescriptor>>>,
    graph: RwLock<DependencyGraph>,
}

impl Registry {
    pub(crate) fn get(&self, id: &ServiceId) -> Option<Arc<ServiceDescriptor>> {
        read(&self.descriptors).get(id).cloned()
    }

    pub(crate) fn get_or_create(&self, id: &ServiceId) -> Arc<ServiceDescriptor> {
        if let Some(descriptor) = self.get(id) {
            return descriptor;
        }
        let mut descriptors = write(&self.descriptors);
        Arc::clone(
            descriptors
                .entry(id.clone())
                .or_insert_with(|| Arc::new(ServiceDescriptor::new(id.clone()))),
        )
    }

    pub(crate) fn attach(
        &self,
        id: &ServiceId,
        routine: Routine,
    ) -> Result<Arc<ServiceDescriptor>, ServiceError> {
        let descriptor = self.get_or_create(id);
        descriptor.attach(routine)?;
        Ok(descriptor)
    }

    /// Replaces the dependency set of `id`.
    ///
    /// Rejected once `id` has left UNINITIALIZED, so orders already computed for it stay valid.
    pub(crate) fn declare(
        &self,
        id: &ServiceId,
        dependencies: Vec<ServiceId>,
    ) -> Result<(), ServiceError> {
        let mut graph = write(&self.graph);
        let descriptor = self.get_or_create(id);
        if descriptor.state() != ServiceState::Uninitialized {
            return Err(ServiceError::DependenciesFrozen(id.clone()));
        }
        for dep in &dependencies {
            self.get_or_create(dep);
        }
        debug!(service = %id, dependencies = ?dependencies, "Dependencies declared");
        graph.declare(id, dependencies);
        Ok(())
    }

    pub(crate) fn dependencies_of(&self, id: &ServiceId) -> Vec<ServiceId> {
        read(&self.graph).dependencies_of(id).to_vec()
    }

    /// True if every dependency currently declared for `id` is READY.
    pub(crate) fn dependencies_ready(&self, id: &ServiceId) -> bool {
        let graph = read(&self.graph);
        graph
            .dependencies_of(id)
            .iter()
            .all(|dep| self.get(dep).is_some_and(|descriptor| descriptor.is_ready()))
    }

    pub(crate) fn order(&self, root: &ServiceId) -> Result<Vec<ServiceId>, ServiceError> {
        graph::resolve_order(&read(&self.graph), root)
    }

    pub(crate) fn detect_cycle(&self, root: &ServiceId) -> Result<(), ServiceError> {
        graph::detect_cycle(&read(&self.graph), root)
    }

    /// Descriptors to walk for a request of `root` made on `path`, dependencies first.
    ///
    /// Everything that can be rejected from the graph alone is rejected here, before any
    /// routine runs: cycles, services already initializing on `path`, unregistered ids.
    pub(crate) fn plan(
        &self,
        root: &ServiceId,
        path: &InitPath,
    ) -> Result<Vec<Arc<ServiceDescriptor>>, ServiceError> {
        let order = self.order(root)?;
        let plan: Vec<_> = order.iter().map(|id| self.get_or_create(id)).collect();

        if let Some(hit) = plan
            .iter()
            .find(|descriptor| !descriptor.is_ready() && path.contains(descriptor.id()))
        {
            let mut chain = path.ids().to_vec();
            chain.push(root.clone());
            if hit.id() != root {
                chain.push(hit.id().clone());
            }
            return Err(ServiceError::SelfDependency {
                service: hit.id().clone(),
                path: chain,
            });
        }

        if let Some(missing) = plan.iter().find(|descriptor| !descriptor.is_registered()) {
            return Err(ServiceError::NotRegistered(missing.id().clone()));
        }
        Ok(plan)
    }

    pub(crate) fn status(&self, id: &ServiceId) -> Option<ServiceStatus> {
        let descriptor = self.get(id)?;
        Some(self.status_of(&descriptor))
    }

    /// Status of every known service, sorted by id.
    pub(crate) fn snapshot(&self) -> Vec<ServiceStatus> {
        let descriptors: Vec<_> = read(&self.descriptors).values().cloned().collect();
        let mut statuses: Vec<_> = descriptors.iter().map(|d| self.status_of(d)).collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    fn status_of(&self, descriptor: &ServiceDescriptor) -> ServiceStatus {
        ServiceStatus {
            id: descriptor.id().clone(),
            state: descriptor.state(),
            dependencies: self.dependencies_of(descriptor.id()),
            last_error: descriptor.last_error().map(|e| e.to_string()),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
