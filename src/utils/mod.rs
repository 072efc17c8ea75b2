// utils/mod.rs
pub mod config;
pub mod error;

// Ré-exports pour faciliter l'import
pub use config::Config;
pub use error::{AppError, Result};
