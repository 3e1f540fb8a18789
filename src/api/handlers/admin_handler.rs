//! Administration Handlers
//!
//! Security monitor and compliance ledger views. These run the screening
//! and authorization stages, then read monitor state directly and record
//! their own audit entries.

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::{Duration, Utc};

use crate::api::app_state::AppState;
use crate::api::dto::admin_dto::{EventsParams, SummaryParams, TrailParams};
use crate::error::AppError;
use crate::gateway::{GatewayRequest, GatewayRoute};
use crate::privacy::AuditFilter;
use crate::security::auth::Claims;
use crate::security::rbac::Permission;

const fn admin_route(name: &'static str, action: &'static str) -> GatewayRoute {
    GatewayRoute {
        name,
        requires_auth: true,
        required_permission: Some(Permission::AdminAccess),
        resource_class: None,
        action,
        purpose: "security_review",
        write: false,
        validate: None,
    }
}

async fn authorize_admin(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    route: &GatewayRoute,
) -> Result<Claims, AppError> {
    let request = GatewayRequest::from_parts("GET", path, headers, None);
    let (claims, _) = state.gateway.authorize(&request, route).await?;
    let claims = claims.ok_or(AppError::MalformedCredential)?;

    state
        .gateway
        .privacy()
        .log_access(&claims.sub, route.action, "system_logs", route.purpose, true)?;

    Ok(claims)
}

pub async fn security_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SummaryParams>,
) -> Result<impl IntoResponse, AppError> {
    const ROUTE: GatewayRoute = admin_route("security_summary", "view_security_summary");
    authorize_admin(&state, &headers, "/api/v1/admin/security/summary", &ROUTE).await?;

    let hours = params.hours.unwrap_or(24);
    Ok(Json(state.gateway.threat().security_summary(hours)))
}

pub async fn security_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<EventsParams>,
) -> Result<impl IntoResponse, AppError> {
    const ROUTE: GatewayRoute = admin_route("security_events", "view_security_events");
    authorize_admin(&state, &headers, "/api/v1/admin/security/events", &ROUTE).await?;

    let limit = params.limit.unwrap_or(100);
    Ok(Json(state.gateway.threat().recent_events(limit)))
}

pub async fn audit_trail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TrailParams>,
) -> Result<impl IntoResponse, AppError> {
    const ROUTE: GatewayRoute = admin_route("audit_trail", "view_audit_trail");
    authorize_admin(&state, &headers, "/api/v1/admin/audit/trail", &ROUTE).await?;

    let days = params.days.unwrap_or(30);
    let filter = AuditFilter {
        principal_id: params.principal_id,
        from: Some(Utc::now() - Duration::days(days)),
        to: None,
    };

    Ok(Json(state.gateway.privacy().audit_trail(&filter)))
}

pub async fn retention_report(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    const ROUTE: GatewayRoute = admin_route("retention_report", "view_retention_report");
    authorize_admin(&state, &headers, "/api/v1/admin/audit/retention", &ROUTE).await?;

    Ok(Json(state.gateway.privacy().scan_retention(Utc::now())))
}
