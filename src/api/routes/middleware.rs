//! # API Middleware
//!
//! Middlewares appliqués par chaque worker HTTP :
//! - `RateLimiter` : fenêtre fixe par adresse IP du client
//! - `build_cors` : politique cross-origin limitée au front-end configuré
//!
//! La compression, le logging des requêtes et le parsing JSON sont fournis
//! directement par actix-web (voir `api::create_app`).

use actix_cors::Cors;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderName, HeaderValue},
    Error,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::utils::error::AppError;

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Au-delà de ce nombre de clés, les fenêtres expirées sont purgées,
/// au plus une fois par durée de fenêtre
const PRUNE_THRESHOLD: usize = 10_000;

/// Construit la politique CORS.
///
/// Sans origine configurée, toute origine est acceptée (elle est renvoyée
/// telle quelle, les cookies restant autorisés).
pub fn build_cors(client_url: Option<&str>) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "DELETE", "PUT"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::CACHE_CONTROL,
            header::EXPIRES,
            header::PRAGMA,
        ])
        .supports_credentials();

    match client_url {
        Some(origin) => cors.allowed_origin(origin),
        None => cors.allow_any_origin(),
    }
}

/// Résultat d'un passage dans le limiteur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: usize,
}

#[derive(Debug)]
struct Windows {
    entries: HashMap<String, Window>,
    last_prune: Instant,
}

/// Compteurs par client, partagés entre les threads d'un même worker
#[derive(Debug)]
pub struct RateLimitStore {
    windows: Mutex<Windows>,
    max_requests: usize,
    window_duration: Duration,
}

impl RateLimitStore {
    pub fn new(max_requests: usize, window_duration: Duration) -> Self {
        Self::with_clock(max_requests, window_duration, Instant::now())
    }

    fn with_clock(max_requests: usize, window_duration: Duration, now: Instant) -> Self {
        Self {
            windows: Mutex::new(Windows {
                entries: HashMap::new(),
                last_prune: now,
            }),
            max_requests,
            window_duration,
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.entries.len() > PRUNE_THRESHOLD
            && now.duration_since(windows.last_prune) >= self.window_duration
        {
            let window_duration = self.window_duration;
            windows
                .entries
                .retain(|_, w| now.duration_since(w.started) < window_duration);
            windows.last_prune = now;
        }

        let window = windows
            .entries
            .entry(key.to_string())
            .or_insert(Window { started: now, count: 0 });

        if now.duration_since(window.started) >= self.window_duration {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.max_requests {
            let elapsed = now.duration_since(window.started);
            return RateLimitDecision::Limited {
                retry_after: self.window_duration.saturating_sub(elapsed),
            };
        }

        window.count += 1;
        RateLimitDecision::Allowed {
            remaining: self.max_requests - window.count,
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }
}

/// Middleware de rate limiting
#[derive(Clone)]
pub struct RateLimiter {
    limits: Arc<RateLimitStore>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_duration: Duration) -> Self {
        Self {
            limits: Arc::new(RateLimitStore::new(max_requests, window_duration)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimiterService {
            service,
            limits: self.limits.clone(),
        })
    }
}

pub struct RateLimiterService<S> {
    service: S,
    limits: Arc<RateLimitStore>,
}

impl<S, B> Service<ServiceRequest> for RateLimiterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Clé = IP de la socket ; les en-têtes de proxy ne sont pas pris en compte
        let key = req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        match self.limits.check(&key) {
            RateLimitDecision::Allowed { remaining } => {
                let limit = self.limits.max_requests();
                let fut = self.service.call(req);

                Box::pin(async move {
                    let mut res = fut.await?;
                    let headers = res.headers_mut();
                    headers.insert(
                        HeaderName::from_static(X_RATELIMIT_LIMIT),
                        HeaderValue::from(limit),
                    );
                    headers.insert(
                        HeaderName::from_static(X_RATELIMIT_REMAINING),
                        HeaderValue::from(remaining),
                    );
                    Ok(res.map_into_left_body())
                })
            }
            RateLimitDecision::Limited { retry_after } => {
                tracing::warn!(client = %key, "🚫 Rate limit dépassé");
                // Arrondi au supérieur pour ne jamais annoncer 0 seconde
                let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                let res = req.error_response(AppError::TooManyRequests { retry_after_secs });
                Box::pin(async move { Ok(res.map_into_right_body()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;
    use actix_web::{http::StatusCode, web, App, HttpResponse};

    #[test]
    fn test_window_allows_up_to_max() {
        let store = RateLimitStore::new(3, Duration::from_secs(60));
        let now = Instant::now();

        assert_eq!(store.check_at("a", now), RateLimitDecision::Allowed { remaining: 2 });
        assert_eq!(store.check_at("a", now), RateLimitDecision::Allowed { remaining: 1 });
        assert_eq!(store.check_at("a", now), RateLimitDecision::Allowed { remaining: 0 });
        assert!(matches!(store.check_at("a", now), RateLimitDecision::Limited { .. }));
    }

    #[test]
    fn test_window_resets_after_duration() {
        let store = RateLimitStore::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(matches!(store.check_at("a", start), RateLimitDecision::Allowed { .. }));
        match store.check_at("a", start + Duration::from_secs(20)) {
            RateLimitDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(40))
            }
            other => panic!("expected Limited, got {:?}", other),
        }
        assert_eq!(
            store.check_at("a", start + Duration::from_secs(60)),
            RateLimitDecision::Allowed { remaining: 0 }
        );
    }

    #[test]
    fn test_clients_are_independent() {
        let store = RateLimitStore::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(matches!(store.check_at("10.0.0.1", now), RateLimitDecision::Allowed { .. }));
        assert!(matches!(store.check_at("10.0.0.2", now), RateLimitDecision::Allowed { .. }));
        assert!(matches!(store.check_at("10.0.0.1", now), RateLimitDecision::Limited { .. }));
        assert_eq!(store.tracked_clients(), 2);
    }

    #[test]
    fn test_expired_windows_are_pruned() {
        let start = Instant::now();
        let store = RateLimitStore::with_clock(1, Duration::from_secs(1), start);

        for i in 0..=PRUNE_THRESHOLD {
            store.check_at(&format!("client-{}", i), start);
        }
        assert_eq!(store.tracked_clients(), PRUNE_THRESHOLD + 1);

        store.check_at("late", start + Duration::from_secs(5));
        assert_eq!(store.tracked_clients(), 1);
    }

    #[test]
    fn test_pruning_runs_at_most_once_per_window() {
        let start = Instant::now();
        let at = |secs| start + Duration::from_secs(secs);
        let store = RateLimitStore::with_clock(1, Duration::from_secs(10), start);

        for i in 0..=PRUNE_THRESHOLD {
            store.check_at(&format!("a-{}", i), start);
        }
        store.check_at("c", at(5));
        store.check_at("late", at(11));
        assert_eq!(store.tracked_clients(), 2);

        // Beaucoup de clients actifs : aucune purge avant la fin de la fenêtre
        for i in 0..=PRUNE_THRESHOLD {
            store.check_at(&format!("b-{}", i), at(12));
        }
        store.check_at("mid", at(16));
        assert_eq!(store.tracked_clients(), PRUNE_THRESHOLD + 4);

        // Une fenêtre après la dernière purge, "c" et "late" expirés disparaissent
        store.check_at("end", at(21));
        assert_eq!(store.tracked_clients(), PRUNE_THRESHOLD + 3);
    }

    #[actix_web::test]
    async fn test_rate_limiter() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimiter::new(100, Duration::from_secs(900)))
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        for i in 0..150 {
            let req = actix_test::TestRequest::get()
                .uri("/")
                .peer_addr("192.168.1.10:40000".parse().unwrap())
                .to_request();
            let resp = actix_test::call_service(&app, req).await;

            if i >= 100 {
                assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
                assert!(resp.headers().contains_key(header::RETRY_AFTER));
            } else {
                assert!(resp.status().is_success());
                assert_eq!(
                    resp.headers().get("x-ratelimit-remaining").unwrap(),
                    (99 - i).to_string().as_str()
                );
            }
        }
    }

    #[actix_web::test]
    async fn test_cors_preflight_from_client_url() {
        let app = actix_test::init_service(
            App::new()
                .wrap(build_cors(Some("https://shop.example.com")))
                .route("/api/auth/login", web::post().to(HttpResponse::Ok)),
        )
        .await;

        let req = actix_test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/api/auth/login")
            .insert_header((header::ORIGIN, "https://shop.example.com"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://shop.example.com"
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[actix_web::test]
    async fn test_cors_rejects_other_origin() {
        let app = actix_test::init_service(
            App::new()
                .wrap(build_cors(Some("https://shop.example.com")))
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/")
            .insert_header((header::ORIGIN, "https://evil.example.org"))
            .to_request();
        // Une origine refusée peut aussi remonter comme erreur de service
        if let Ok(resp) = actix_test::try_call_service(&app, req).await {
            assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        }
    }
}
