use crate::model::{User, UserId};
use crate::services::{BootJournal, Db, DbError};
use async_trait::async_trait;
use singleton_service::{BoxError, Service, ServiceError, ServiceHandle};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user {0} not found")]
    NotFound(UserId),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// User lookups on top of [`Db`].
pub struct Users {
    db: ServiceHandle<Db>,
    journal: BootJournal,
}

impl Users {
    pub const ID: &'static str = "Users";

    pub fn new(db: ServiceHandle<Db>, journal: BootJournal) -> Self {
        Self { db, journal }
    }

    /// Callers go through a guarded handle, so `Db` is READY here.
    pub fn get(&self, id: UserId) -> Result<User, UserError> {
        self.db.unguarded().find(id)?.ok_or(UserError::NotFound(id))
    }

    pub fn create(&self, name: &str, email: &str) -> Result<User, UserError> {
        let db = self.db.unguarded();
        let user = User::new(db.next_id()?, name, email);
        db.insert(user.clone())?;
        Ok(user)
    }
}

#[async_trait]
impl Service for Users {
    async fn initialize(&self) -> Result<(), BoxError> {
        self.journal.record(Self::ID);
        let db = self.db.ready().await?;
        info!(rows = db.len()?, "Users attached to table");
        Ok(())
    }
}
