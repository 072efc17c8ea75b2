//! Rôle worker : un serveur HTTP complet par processus

use actix_web::{web, HttpServer};
use std::env;
use tracing::info;

use super::launcher::WORKER_SLOT_ENV;
use crate::api::{create_app, routes::middleware::RateLimiter, AppState};
use crate::infrastructure::{database::Database, listener::create_listener};
use crate::utils::{config::Config, error::Result};

/// Emplacement attribué par le superviseur, absent si le worker est lancé à la main
pub fn worker_slot_from_env() -> Option<usize> {
    env::var(WORKER_SLOT_ENV).ok().and_then(|raw| raw.parse().ok())
}

/// Démarre le serveur HTTP du worker et bloque jusqu'à son arrêt.
///
/// La base est vérifiée en arrière-plan : un échec de connexion est
/// journalisé mais le worker écoute quand même.
pub async fn run_worker(config: Config) -> Result<()> {
    let pid = std::process::id();
    let worker_slot = worker_slot_from_env();

    let db = Database::connect_lazy(
        &config.database_url,
        config.database_max_connections,
        config.database_connection_timeout(),
    )?;
    db.spawn_verification();

    let (addr, listener) = create_listener(&config.server_host, config.server_port)?;

    let limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window());
    let shutdown_timeout = config.shutdown_timeout_secs;
    let port = config.server_port;
    let state = web::Data::new(AppState {
        db,
        config,
        worker_slot,
    });

    let server = HttpServer::new(move || create_app(state.clone(), limiter.clone()))
        .listen(listener)?
        .workers(1)
        .shutdown_timeout(shutdown_timeout)
        .run();

    info!(pid, slot = ?worker_slot, addr = %addr, "Worker {} is running on port {}", pid, port);

    server.await?;
    Ok(())
}
