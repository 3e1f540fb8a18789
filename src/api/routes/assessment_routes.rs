//! Assessment Routes

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::app_state::AppState;
use crate::api::handlers::assessment_handler::*;

/// Assessment and analytics-export router
pub fn create_assessment_router() -> Router<AppState> {
    Router::new()
        .route("/assessments", post(create_assessment))
        .route("/assessments/history", get(assessment_history))
        .route("/assessments/:id", get(get_assessment))
        .route("/analytics/export", get(export_analytics))
}
