//! Authentication Handlers
//!
//! Credential exchange endpoints. Login and refresh are unprotected
//! routes: they still pass the gateway's screening stages (threat scan +
//! rate check) before touching the credential store, and every attempt
//! lands in the audit ledger under `system_logs`.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::debug;
use validator::Validate;

use crate::api::app_state::AppState;
use crate::api::dto::auth_dto::*;
use crate::api::dto::violations_from;
use crate::error::AppError;
use crate::gateway::{GatewayRequest, GatewayRoute};
use crate::security::rbac::Permission;

const ME_ROUTE: GatewayRoute = GatewayRoute {
    name: "me",
    requires_auth: true,
    required_permission: None,
    resource_class: None,
    action: "view_profile",
    purpose: "authentication",
    write: false,
    validate: None,
};

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    debug!(username = %request.username, "login attempt");

    request
        .validate()
        .map_err(|e| AppError::ValidationFailed {
            violations: violations_from(e),
        })?;

    let body = serde_json::to_value(&request)?;
    let gw_request =
        GatewayRequest::from_parts("POST", "/api/v1/auth/login", &headers, Some(body));
    state.gateway.screen(&gw_request).await?;

    match state.auth_service.login(
        &request.username,
        &request.password,
        request.mfa_code.as_deref(),
    ) {
        Ok(bundle) => {
            state.gateway.privacy().log_access(
                &bundle.principal.id,
                "login",
                "system_logs",
                "authentication",
                true,
            )?;
            Ok(Json(LoginResponse::new(bundle.pair, &bundle.principal)))
        }
        Err(e) => {
            state.gateway.privacy().log_access(
                &request.username,
                "login",
                "system_logs",
                "authentication",
                false,
            )?;
            Err(e)
        }
    }
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::ValidationFailed {
            violations: violations_from(e),
        })?;

    // The refresh token itself is not scanned; only headers feed the
    // screening stages here.
    let gw_request = GatewayRequest::from_parts("POST", "/api/v1/auth/refresh", &headers, None);
    state.gateway.screen(&gw_request).await?;

    let bundle = state.auth_service.refresh(&request.refresh_token)?;
    state.gateway.privacy().log_access(
        &bundle.principal.id,
        "refresh",
        "system_logs",
        "authentication",
        true,
    )?;

    Ok(Json(LoginResponse::new(bundle.pair, &bundle.principal)))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let gw_request = GatewayRequest::from_parts("GET", "/api/v1/auth/me", &headers, None);
    let (claims, _) = state.gateway.authorize(&gw_request, &ME_ROUTE).await?;

    let claims = claims.ok_or(AppError::MalformedCredential)?;
    Ok(Json(MeResponse::from(&claims)))
}

/// Deactivate a principal (admin only). The record stays; only `active`
/// flips, so audit history keeps its subject.
pub async fn deactivate_principal(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<impl IntoResponse, AppError> {
    const ROUTE: GatewayRoute = GatewayRoute {
        name: "deactivate_principal",
        requires_auth: true,
        required_permission: Some(Permission::AdminAccess),
        resource_class: None,
        action: "deactivate_principal",
        purpose: "administration",
        write: false,
        validate: None,
    };

    let path = format!("/api/v1/auth/principals/{}/deactivate", id);
    let gw_request = GatewayRequest::from_parts("POST", &path, &headers, None);
    let (claims, _) = state.gateway.authorize(&gw_request, &ROUTE).await?;
    let claims = claims.ok_or(AppError::MalformedCredential)?;

    state.principals.deactivate(&id)?;
    state
        .gateway
        .privacy()
        .log_access(&claims.sub, "deactivate_principal", "system_logs", "administration", true)?;

    Ok(StatusCode::NO_CONTENT)
}
