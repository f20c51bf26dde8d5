use crate::model::{User, UserId};
use crate::services::{BootJournal, Config};
use async_trait::async_trait;
use singleton_service::{BoxError, InitCell, Service, ServiceError, ServiceHandle};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;

const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("unsupported database url {0:?}, expected memory://<table>")]
    UnsupportedUrl(String),

    #[error("user {0} already exists")]
    DuplicateUser(UserId),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

type Table = RwLock<BTreeMap<UserId, User>>;

/// In-memory user table, opened from the configured url.
pub struct Db {
    config: ServiceHandle<Config>,
    table: InitCell<Table>,
    journal: BootJournal,
}

impl Db {
    pub const ID: &'static str = "Db";

    pub fn new(config: ServiceHandle<Config>, journal: BootJournal) -> Self {
        Self {
            config,
            table: InitCell::new(Self::ID, "table"),
            journal,
        }
    }

    pub fn find(&self, id: UserId) -> Result<Option<User>, DbError> {
        let table = self.table.get()?;
        let rows = table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.get(&id).cloned())
    }

    pub fn insert(&self, user: User) -> Result<(), DbError> {
        let table = self.table.get()?;
        let mut rows = table.write().unwrap_or_else(PoisonError::into_inner);
        if rows.contains_key(&user.id) {
            return Err(DbError::DuplicateUser(user.id));
        }
        rows.insert(user.id, user);
        Ok(())
    }

    /// Next free id.
    pub fn next_id(&self) -> Result<UserId, DbError> {
        let table = self.table.get()?;
        let rows = table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.keys().next_back().map_or(1, |last| last + 1))
    }

    pub fn len(&self) -> Result<usize, DbError> {
        let table = self.table.get()?;
        Ok(table.read().unwrap_or_else(PoisonError::into_inner).len())
    }
}

#[async_trait]
impl Service for Db {
    async fn initialize(&self) -> Result<(), BoxError> {
        self.journal.record(Self::ID);
        let settings = self.config.ready().await?.settings()?;

        let table_name = settings
            .db_url
            .strip_prefix(MEMORY_SCHEME)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DbError::UnsupportedUrl(settings.db_url.clone()))?;

        let rows: BTreeMap<_, _> = (1..=settings.seed_users)
            .map(|id| (id, User::seed(id)))
            .collect();
        info!(table = table_name, rows = rows.len(), "Opened in-memory table");

        self.table.set(RwLock::new(rows))?;
        Ok(())
    }

    async fn ping(&self) -> Result<bool, BoxError> {
        Ok(self.table.is_set())
    }
}
