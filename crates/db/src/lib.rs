pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod session;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use session::SqlSessionStore;
