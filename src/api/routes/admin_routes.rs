//! Administration Routes

use axum::{Router, routing::get};

use crate::api::app_state::AppState;
use crate::api::handlers::admin_handler::*;

/// Security monitor / compliance ledger router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/security/summary", get(security_summary))
        .route("/admin/security/events", get(security_events))
        .route("/admin/audit/trail", get(audit_trail))
        .route("/admin/audit/retention", get(retention_report))
}
