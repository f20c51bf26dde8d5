//! # Users Client
//!
//! High-level API over the `Users` service. Every method waits for the `Config -> Db -> Users`
//! chain before touching the table.
use crate::model::{User, UserId};
use crate::services::{UserError, Users};
use singleton_service::{Guarded, ServiceHandle};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct UsersClient {
    handle: ServiceHandle<Users>,
}

impl UsersClient {
    pub fn new(handle: ServiceHandle<Users>) -> Self {
        Self { handle }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: UserId) -> Result<User, UserError> {
        debug!("Looking up user");
        self.handle.ready_for("get").await?.get(id)
    }

    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, email: &str) -> Result<User, UserError> {
        debug!("Creating user");
        self.ready().await?.create(name, email)
    }

    /// For callers on plain threads.
    pub fn get_blocking(&self, id: UserId) -> Result<User, UserError> {
        self.handle.ready_blocking_for("get")?.get(id)
    }
}

impl Guarded for UsersClient {
    type Service = Users;

    fn handle(&self) -> &ServiceHandle<Users> {
        &self.handle
    }
}
