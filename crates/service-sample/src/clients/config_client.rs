use crate::model::Settings;
use crate::services::Config;
use singleton_service::{Guarded, ServiceError, ServiceHandle};
use tracing::instrument;

/// Read access to the loaded settings.
#[derive(Clone)]
pub struct ConfigClient {
    handle: ServiceHandle<Config>,
}

impl ConfigClient {
    pub fn new(handle: ServiceHandle<Config>) -> Self {
        Self { handle }
    }

    #[instrument(skip(self))]
    pub async fn settings(&self) -> Result<Settings, ServiceError> {
        self.ready().await?.settings().cloned()
    }
}

impl Guarded for ConfigClient {
    type Service = Config;

    fn handle(&self) -> &ServiceHandle<Config> {
        &self.handle
    }
}
