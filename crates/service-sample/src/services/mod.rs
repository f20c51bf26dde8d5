//! # Sample Services
//!
//! Three singletons with a chain of dependencies:
//!
//! ```text
//! Users ──requires──► Db ──requires──► Config
//! ```
//!
//! - [`Config`] blocks while it reads the environment.
//! - [`Db`] suspends while it opens an in-memory table seeded from the settings.
//! - [`Users`] exposes lookups on top of the table.
//!
//! Each service records its `initialize()` in a shared [`BootJournal`].

pub mod config;
pub mod db;
pub mod users;

pub use config::{Config, ConfigError};
pub use db::{Db, DbError};
pub use users::{UserError, Users};

use std::sync::{Arc, Mutex, PoisonError};

/// Ordered list of boot steps, shared by all services of an application.
#[derive(Debug, Clone, Default)]
pub struct BootJournal {
    entries: Arc<Mutex<Vec<&'static str>>>,
}

impl BootJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, step: &'static str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(step);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
