use std::sync::Arc;

use axum::{
    http::{HeaderName, Method, StatusCode},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;
use crate::proxy::registry::ProxyRegistry;

pub mod handlers;

/// Shared state for the bridge handlers.
pub struct AppState {
    pub gateway: Arc<dyn Gateway>,
    pub registry: ProxyRegistry,
}

/// Build the local bridge router.
pub fn bridge_router(state: Arc<AppState>, dashboard_origin: &str) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/proxies", get(handlers::list_proxies))
        .route(
            "/api/:resource/:action",
            get(handlers::call_backend).post(handlers::call_backend),
        )
        .fallback(fallback_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(dashboard_origin.to_string()))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Only the configured dashboard origin and localhost may call the bridge.
fn cors_layer(dashboard_origin: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == dashboard_origin
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([HeaderName::from_static("content-type")])
}
