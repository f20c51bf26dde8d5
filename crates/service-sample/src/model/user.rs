use serde::{Deserialize, Serialize};

pub type UserId = u64;

/// A row of the in-memory user table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }

    /// The `n`-th generated seed user, starting at id 1.
    pub fn seed(n: UserId) -> Self {
        Self::new(n, format!("user-{n}"), format!("user-{n}@example.com"))
    }
}
