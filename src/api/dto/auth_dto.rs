//! Authentication DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::principal::Principal;
use crate::security::auth::{Claims, TokenPair};

/// Credential exchange request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 128))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    /// Second factor, required when the principal has MFA enabled
    pub mfa_code: Option<String>,
}

/// Principal summary embedded in the login response
#[derive(Debug, Serialize)]
pub struct PrincipalSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<&Principal> for PrincipalSummary {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id.clone(),
            username: p.username.clone(),
            email: p.email.clone(),
            role: p.role.to_string(),
        }
    }
}

/// Credential exchange response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub principal: PrincipalSummary,
}

impl LoginResponse {
    pub fn new(pair: TokenPair, principal: &Principal) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer",
            expires_in: pair.expires_in,
            principal: principal.into(),
        }
    }
}

/// Token refresh request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Current-principal view decoded from the access credential
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub username: String,
    pub role: String,
    pub permissions: Vec<String>,
}

impl From<&Claims> for MeResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            username: claims.username.clone(),
            role: claims.role.clone(),
            permissions: claims.permissions.clone(),
        }
    }
}
