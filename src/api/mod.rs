pub mod routes;

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware as actix_middleware, web, App, HttpResponse, Responder,
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::infrastructure::database::Database;
use crate::utils::{config::Config, error::AppError};
use routes::middleware::{build_cors, RateLimiter};

/// État partagé par les handlers d'un worker
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    /// Emplacement du worker dans le pool du superviseur (None hors cluster)
    pub worker_slot: Option<usize>,
}

/// Construit l'application complète : middlewares + routes.
///
/// Ordre vu par une requête : CORS, logging, compression, rate limiting,
/// puis les routes. Le limiteur est passé en paramètre pour que tous les
/// threads actix d'un même worker partagent les mêmes compteurs.
pub fn create_app(
    state: web::Data<AppState>,
    limiter: RateLimiter,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let cors = build_cors(state.config.client_url.as_deref());
    let json_config = web::JsonConfig::default()
        .limit(state.config.json_body_limit)
        .error_handler(|err, _req| AppError::from(err).into());

    App::new()
        .app_data(state)
        .app_data(json_config)
        .configure(routes::config)
        .route("/health", web::get().to(health_check))
        .default_service(web::to(routes::not_found))
        .wrap(limiter)
        .wrap(actix_middleware::Compress::default())
        .wrap(actix_middleware::Logger::default())
        .wrap(cors)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    pid: u32,
    worker_slot: Option<usize>,
    database: DatabaseHealth,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct DatabaseHealth {
    max_connections: u32,
    open_connections: u32,
}

/// Endpoint de santé pour monitoring
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        pid: std::process::id(),
        worker_slot: state.worker_slot,
        database: DatabaseHealth {
            max_connections: state.db.max_connections(),
            open_connections: state.db.open_connections(),
        },
        timestamp: Utc::now(),
    })
}
