use actix_web::{web, HttpRequest, HttpResponse};

use crate::utils::error::AppError;

pub mod middleware;

/// Groupe de routes monté par chaque worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteGroup {
    pub name: &'static str,
    pub path: &'static str,
}

/// Points de montage de l'API. Les handlers de chaque groupe sont fournis
/// par des modules externes ; tant qu'ils ne sont pas branchés, le groupe
/// répond `501 Not Implemented`.
pub const ROUTE_GROUPS: [RouteGroup; 10] = [
    RouteGroup { name: "auth", path: "/api/auth" },
    RouteGroup { name: "admin products", path: "/api/admin/products" },
    RouteGroup { name: "admin orders", path: "/api/admin/orders" },
    RouteGroup { name: "shop products", path: "/api/shop/products" },
    RouteGroup { name: "shop cart", path: "/api/shop/cart" },
    RouteGroup { name: "shop address", path: "/api/shop/address" },
    RouteGroup { name: "shop order", path: "/api/shop/order" },
    RouteGroup { name: "shop search", path: "/api/shop/search" },
    RouteGroup { name: "shop review", path: "/api/shop/review" },
    RouteGroup { name: "common feature", path: "/api/common/feature" },
];

/// Monte tous les groupes de routes
pub fn config(cfg: &mut web::ServiceConfig) {
    for group in ROUTE_GROUPS {
        cfg.service(
            web::scope(group.path).default_service(web::to(move || async move {
                Err::<HttpResponse, _>(AppError::NotImplemented(group.name.to_string()))
            })),
        );
    }
}

/// Réponse JSON pour les chemins inconnus
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound(req.path().to_string()))
}
