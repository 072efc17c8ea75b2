//! # Shop Backend
//!
//! Point d'entrée serveur d'une API REST e-commerce : superviseur de
//! processus workers, pool PostgreSQL, CORS, compression, rate limiting
//! et montage des groupes de routes.

pub mod api;
pub mod infrastructure;
pub mod utils;
pub mod workers;

/// Version de l'application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Nom de l'application
pub const NAME: &str = env!("CARGO_PKG_NAME");
