use crate::framework::error::{Result, ServiceError};
use crate::framework::ServiceId;
use crate::lifecycle::orchestrator::WeakOrchestrator;
use crate::lifecycle::{Orchestrator, ServiceDescriptor, ServiceState};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Typed access to a registered singleton.
///
/// Every guarded accessor first makes sure the service and its dependency closure are READY.
/// Once they are, the check is a single atomic load on the cached descriptor.
///
/// A handle keeps its orchestrator alive. A service that stores a handle to another service
/// should store a [`downgrade`](Self::downgrade)d one, otherwise the orchestrator owns a
/// service that owns the orchestrator and neither is ever dropped.
pub struct ServiceHandle<S> {
    service: Arc<S>,
    descriptor: Arc<ServiceDescriptor>,
    owner: Owner,
}

#[derive(Clone)]
enum Owner {
    Strong(Orchestrator),
    Weak(WeakOrchestrator),
}

impl<S> Clone for ServiceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            descriptor: Arc::clone(&self.descriptor),
            owner: self.owner.clone(),
        }
    }
}

impl<S> ServiceHandle<S> {
    pub(crate) fn new(
        service: Arc<S>,
        descriptor: Arc<ServiceDescriptor>,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            service,
            descriptor,
            owner: Owner::Strong(orchestrator),
        }
    }

    /// The same handle without ownership of the orchestrator.
    ///
    /// Guarded calls on it fail with [`ServiceError::Detached`] once the orchestrator is gone.
    pub fn downgrade(&self) -> Self {
        let owner = match &self.owner {
            Owner::Strong(orchestrator) => Owner::Weak(orchestrator.downgrade()),
            Owner::Weak(weak) => Owner::Weak(weak.clone()),
        };
        Self {
            service: Arc::clone(&self.service),
            descriptor: Arc::clone(&self.descriptor),
            owner,
        }
    }

    pub fn id(&self) -> &ServiceId {
        self.descriptor.id()
    }

    pub fn state(&self) -> ServiceState {
        self.descriptor.state()
    }

    /// The orchestrator, unless this is a downgraded handle that outlived it.
    pub fn orchestrator(&self) -> Option<Orchestrator> {
        match &self.owner {
            Owner::Strong(orchestrator) => Some(orchestrator.clone()),
            Owner::Weak(weak) => weak.upgrade(),
        }
    }

    fn owner(&self) -> Result<Orchestrator> {
        self.orchestrator()
            .ok_or_else(|| ServiceError::Detached(self.id().clone()))
    }

    /// Declares the services this one depends on.
    pub fn requires<I, D>(self, dependencies: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<ServiceId>,
    {
        self.owner()?.declare(self.id(), dependencies)?;
        Ok(self)
    }

    /// The service without any readiness check.
    ///
    /// For code that must not trigger initialization, such as the service's own `initialize()`.
    pub fn unguarded(&self) -> &S {
        &self.service
    }

    pub async fn ready(&self) -> Result<&S> {
        self.ready_for("ready").await
    }

    /// Waits for READY, recording `operation` as the reason for any initialization it starts.
    pub async fn ready_for(&self, operation: &str) -> Result<&S> {
        if !self.descriptor.is_ready() {
            self.owner()?
                .ensure_ready_for(self.id(), operation)
                .await?;
        }
        Ok(&self.service)
    }

    /// Blocking form of [`ready`](Self::ready). Must not be called from inside an async task.
    pub fn ready_blocking(&self) -> Result<&S> {
        self.ready_blocking_for("ready")
    }

    pub fn ready_blocking_for(&self, operation: &str) -> Result<&S> {
        if !self.descriptor.is_ready() {
            self.owner()?
                .ensure_ready_blocking_for(self.id(), operation)?;
        }
        Ok(&self.service)
    }

    /// Runs a synchronous guarded operation from async code.
    pub async fn call<R>(&self, operation: &str, f: impl FnOnce(&S) -> R) -> Result<R> {
        let service = self.ready_for(operation).await?;
        Ok(f(service))
    }

    /// Runs an asynchronous guarded operation.
    pub async fn call_async<'a, R, F, Fut>(&'a self, operation: &str, f: F) -> Result<R>
    where
        F: FnOnce(&'a S) -> Fut,
        Fut: Future<Output = R>,
    {
        let service = self.ready_for(operation).await?;
        Ok(f(service).await)
    }

    /// Runs a synchronous guarded operation on a blocking caller.
    pub fn call_blocking<R>(&self, operation: &str, f: impl FnOnce(&S) -> R) -> Result<R> {
        let service = self.ready_blocking_for(operation)?;
        Ok(f(service))
    }
}

impl<S> fmt::Debug for ServiceHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("id", self.id())
            .field("state", &self.state())
            .field("detached", &self.orchestrator().is_none())
            .finish()
    }
}
