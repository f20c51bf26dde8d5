pub mod settings;
pub mod user;

pub use settings::Settings;
pub use user::{User, UserId};
