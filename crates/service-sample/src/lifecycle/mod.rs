//! # Application Wiring
//!
//! [`AppServices`] registers every service with one orchestrator and declares the edges between
//! them. Nothing is initialized here: the first guarded call brings up exactly the part of the
//! graph it needs, in dependency order.
//!
//! ```rust,ignore
//! let app = AppServices::new()?;
//!
//! // Boots Config, then Db, then Users
//! let alice = app.users.get(1).await?;
//!
//! // Already READY: no initialization at all
//! let bob = app.users.get(2).await?;
//! ```

use crate::clients::{ConfigClient, UsersClient};
use crate::model::Settings;
use crate::services::{BootJournal, Config, Db, Users};
use singleton_service::{Orchestrator, ServiceError, ServiceHandle};
use tracing::info;

pub struct AppServices {
    pub orchestrator: Orchestrator,
    pub config: ConfigClient,
    pub users: UsersClient,
    pub db: ServiceHandle<Db>,
    pub journal: BootJournal,
}

impl AppServices {
    /// Services configured from the process environment.
    pub fn new() -> Result<Self, ServiceError> {
        let journal = BootJournal::new();
        Self::wire(Config::from_env(journal.clone()), journal)
    }

    /// Services configured with fixed settings.
    pub fn with_settings(settings: Settings) -> Result<Self, ServiceError> {
        let journal = BootJournal::new();
        Self::wire(Config::fixed(settings, journal.clone()), journal)
    }

    fn wire(config: Config, journal: BootJournal) -> Result<Self, ServiceError> {
        let setup_journal = journal.clone();
        let orchestrator = Orchestrator::builder()
            .setup(move || {
                setup_journal.record("setup");
                info!("Boot sequence started");
                Ok(())
            })
            .build();

        let config = orchestrator.register_blocking(Config::ID, config)?;
        let db = orchestrator
            .register(Db::ID, Db::new(config.downgrade(), journal.clone()))?
            .requires([Config::ID])?;
        let users = orchestrator
            .register(Users::ID, Users::new(db.downgrade(), journal.clone()))?
            .requires([Db::ID])?;

        Ok(Self {
            orchestrator,
            config: ConfigClient::new(config),
            users: UsersClient::new(users),
            db,
            journal,
        })
    }
}
