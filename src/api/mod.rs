//! API Module
//!
//! REST surface over the request gateway.

pub mod app_state;
pub mod dto;
pub mod handlers;
pub mod routes;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::app_state::AppState;
use crate::security::middleware::security_headers_middleware;

pub fn create_router(app_state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::auth_routes::create_auth_router())
        .merge(routes::assessment_routes::create_assessment_router())
        .merge(routes::admin_routes::create_admin_router());

    Router::new()
        .nest("/api/v1", api)
        // Hardening headers on every response
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
