use crate::model::settings::{Settings, DB_URL_VAR, SEED_USERS_VAR};
use crate::services::BootJournal;
use singleton_service::{BlockingService, BoxError, InitCell, ServiceError};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

enum Source {
    Environment,
    Fixed(Settings),
}

/// Application settings, read once.
pub struct Config {
    source: Source,
    settings: InitCell<Settings>,
    journal: BootJournal,
}

impl Config {
    pub const ID: &'static str = "Config";

    /// Settings read from `SAMPLE_DB_URL` and `SAMPLE_SEED_USERS`, with defaults.
    pub fn from_env(journal: BootJournal) -> Self {
        Self::with_source(Source::Environment, journal)
    }

    pub fn fixed(settings: Settings, journal: BootJournal) -> Self {
        Self::with_source(Source::Fixed(settings), journal)
    }

    fn with_source(source: Source, journal: BootJournal) -> Self {
        Self {
            source,
            settings: InitCell::new(Self::ID, "settings"),
            journal,
        }
    }

    pub fn settings(&self) -> Result<&Settings, ServiceError> {
        self.settings.get()
    }

    fn load(&self) -> Result<Settings, ConfigError> {
        let settings = match &self.source {
            Source::Fixed(settings) => settings.clone(),
            Source::Environment => {
                let defaults = Settings::default();
                let db_url = std::env::var(DB_URL_VAR).unwrap_or(defaults.db_url);
                let seed_users = match std::env::var(SEED_USERS_VAR) {
                    Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                        name: SEED_USERS_VAR,
                        value,
                    })?,
                    Err(_) => defaults.seed_users,
                };
                Settings { db_url, seed_users }
            }
        };
        Ok(settings)
    }
}

impl BlockingService for Config {
    fn initialize(&self) -> Result<(), BoxError> {
        self.journal.record(Self::ID);
        let settings = self.load()?;
        debug!(?settings, "Settings loaded");
        info!(db_url = %settings.db_url, seed_users = settings.seed_users, "Configuration ready");
        self.settings.set(settings)?;
        Ok(())
    }
}
