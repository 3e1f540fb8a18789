//! Assessment Handlers
//!
//! Business routes running the full gateway pipeline; the handler only
//! shapes the transport (status codes, JSON envelope).

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::Value;

use crate::api::app_state::AppState;
use crate::api::dto::assessment_dto::validate_create_assessment;
use crate::error::AppError;
use crate::gateway::{GatewayRequest, GatewayRoute};
use crate::security::rbac::Permission;

const CREATE_ROUTE: GatewayRoute = GatewayRoute {
    name: "create_assessment",
    requires_auth: true,
    required_permission: Some(Permission::WriteAssessments),
    resource_class: Some("assessment_data"),
    action: "create_assessment",
    purpose: "health_assessment",
    write: true,
    validate: Some(validate_create_assessment),
};

const HISTORY_ROUTE: GatewayRoute = GatewayRoute {
    name: "assessment_history",
    requires_auth: true,
    required_permission: Some(Permission::ReadAssessments),
    resource_class: Some("assessment_data"),
    action: "view_assessment_history",
    purpose: "patient_care",
    write: false,
    validate: None,
};

const GET_ROUTE: GatewayRoute = GatewayRoute {
    name: "get_assessment",
    requires_auth: true,
    required_permission: Some(Permission::ReadAssessments),
    resource_class: Some("assessment_data"),
    action: "view_assessment",
    purpose: "patient_care",
    write: false,
    validate: None,
};

const EXPORT_ROUTE: GatewayRoute = GatewayRoute {
    name: "export_analytics",
    requires_auth: true,
    required_permission: Some(Permission::ExportData),
    resource_class: Some("analytics_data"),
    action: "create_analytics_dataset",
    purpose: "analytics",
    write: false,
    validate: None,
};

pub async fn create_assessment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let request =
        GatewayRequest::from_parts("POST", "/api/v1/assessments", &headers, Some(body));
    let response = state.gateway.handle(&request, &CREATE_ROUTE).await?;

    Ok((StatusCode::CREATED, Json(response.body)))
}

pub async fn assessment_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let request =
        GatewayRequest::from_parts("GET", "/api/v1/assessments/history", &headers, None);
    let response = state.gateway.handle(&request, &HISTORY_ROUTE).await?;

    Ok(Json(response.body))
}

pub async fn get_assessment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let path = format!("/api/v1/assessments/{}", id);
    let request = GatewayRequest::from_parts("GET", &path, &headers, None);
    let response = state.gateway.handle(&request, &GET_ROUTE).await?;

    Ok(Json(response.body))
}

pub async fn export_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let request =
        GatewayRequest::from_parts("GET", "/api/v1/analytics/export", &headers, None);
    let response = state.gateway.handle(&request, &EXPORT_ROUTE).await?;

    Ok(Json(response.body))
}
