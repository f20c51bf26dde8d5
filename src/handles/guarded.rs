use crate::framework::error::Result;
use crate::handles::ServiceHandle;
use async_trait::async_trait;

/// Trait for domain clients that front a registered service.
///
/// Implementors only provide [`handle`](Guarded::handle); the readiness gates come for free and
/// each guarded method starts with one of them.
#[async_trait]
pub trait Guarded: Send + Sync {
    type Service: Send + Sync + 'static;

    fn handle(&self) -> &ServiceHandle<Self::Service>;

    /// Waits until the service and its dependencies are READY.
    #[tracing::instrument(skip(self))]
    async fn ready(&self) -> Result<&Self::Service> {
        tracing::debug!(service = %self.handle().id(), "Awaiting service");
        self.handle().ready().await
    }

    /// Blocking form of [`ready`](Guarded::ready).
    fn ready_blocking(&self) -> Result<&Self::Service> {
        self.handle().ready_blocking()
    }
}
