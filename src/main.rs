use dotenv::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shop_backend::utils::config::{cluster_size_from_env, Config};
use shop_backend::utils::error::Result;
use shop_backend::workers::{run_worker, start_cluster, WORKER_FLAG};

fn main() {
    // Charger le fichier .env avant le logging pour LOG_LEVEL / LOG_FORMAT
    dotenv().ok();
    setup_tracing();

    let result = if env::args().any(|arg| arg == WORKER_FLAG) {
        run_worker_role()
    } else {
        run_supervisor()
    };

    if let Err(e) = result {
        error!("❌ Arrêt sur erreur: {}", e);
        std::process::exit(1);
    }
}

/// Rôle worker : la configuration complète n'est chargée qu'ici.
/// Un échec termine ce worker ; le superviseur le remplacera.
fn run_worker_role() -> Result<()> {
    let config = Config::from_env()?;
    actix_web::rt::System::new().block_on(run_worker(config))
}

/// Rôle superviseur : runtime mono-thread, il ne fait qu'attendre des fins de processus
fn run_supervisor() -> Result<()> {
    let pool_size = cluster_size_from_env();
    info!(
        "🚀 Démarrage de {} v{} ({} workers)",
        shop_backend::NAME,
        shop_backend::VERSION,
        pool_size
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(start_cluster(pool_size))
}

/// Configure le tracing pour le logging structuré (sur stderr)
fn setup_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".into());

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = (log_format == "json").then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
    });
    let compact_layer = (log_format != "json").then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(compact_layer)
        .init();
}
