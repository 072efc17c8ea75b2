pub mod database;
pub mod listener;

pub use database::Database;
pub use listener::create_listener;
