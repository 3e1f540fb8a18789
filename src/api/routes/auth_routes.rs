//! Authentication Routes

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::app_state::AppState;
use crate::api::handlers::auth_handler::*;

/// Credential exchange router
pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/auth/principals/:id/deactivate", post(deactivate_principal))
}
