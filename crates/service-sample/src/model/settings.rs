use serde::{Deserialize, Serialize};

pub const DB_URL_VAR: &str = "SAMPLE_DB_URL";
pub const SEED_USERS_VAR: &str = "SAMPLE_SEED_USERS";

/// Application settings loaded by the `Config` service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub db_url: String,
    pub seed_users: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_url: "memory://users".to_string(),
            seed_users: 3,
        }
    }
}
