pub mod config_client;
pub mod users_client;

pub use config_client::ConfigClient;
pub use users_client::UsersClient;
