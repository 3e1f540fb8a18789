//! Error Handling Module
//!
//! Defines the application error taxonomy and its HTTP mapping.
//!
//! Authentication failures (malformed / bad signature / expired) share one
//! external 401 surface so callers cannot distinguish them. Encryption and
//! audit-write failures are fail-closed: the request dies rather than
//! proceeding without protection.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation violation, returned in full to the
/// caller so a client can correct its input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldViolation {
    /// Dotted path of the offending field
    pub field: String,
    /// Violation description
    pub violation: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, violation: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            violation: violation.into(),
        }
    }
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Credential could not be parsed (includes a missing credential on a
    /// protected route)
    #[error("malformed credential")]
    MalformedCredential,

    /// Credential signature did not verify
    #[error("invalid credential signature")]
    InvalidSignature,

    /// Credential is past its expiry timestamp
    #[error("expired credential")]
    ExpiredCredential,

    /// Login failure from the credential exchange
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A second factor is required but was not supplied
    #[error("mfa code required")]
    MfaRequired,

    /// The supplied second factor did not verify
    #[error("invalid mfa code")]
    MfaInvalid,

    /// Principal's permission snapshot lacks the required permission
    #[error("insufficient permission: {required}")]
    InsufficientPermission { required: String },

    /// Request exceeded a rate window or the identifier is blocked
    #[error("rate limited ({reason}), retry after {retry_after}s")]
    RateLimited { reason: String, retry_after: u64 },

    /// A high/critical threat signature matched the payload
    #[error("threat detected: {category} ({severity})")]
    ThreatDetected { category: String, severity: String },

    /// Structural input validation failed
    #[error("validation failed ({} violations)", violations.len())]
    ValidationFailed { violations: Vec<FieldViolation> },

    /// Encryption or decryption failed; fail-closed
    #[error("encryption failure")]
    EncryptionFailure,

    /// Audit ledger append failed; fail-closed
    #[error("audit write failure")]
    AuditWriteFailure,

    /// Resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Shared state store error (KV backend unreachable, etc.)
    #[error("state store error: {0}")]
    StateStore(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

/// Error response body
///
/// `code` is the coarse HTTP-class code; `reason` is the stable
/// machine-readable reason a client should branch on.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Stable machine-readable reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Seconds until retry is allowed (rate limiting)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Itemized validation violations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<FieldViolation>>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            reason: None,
            retry_after: None,
            violations: None,
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_retry_after(mut self, retry_after: u64) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_violations(mut self, violations: Vec<FieldViolation>) -> Self {
        self.violations = Some(violations);
        self
    }
}

impl AppError {
    /// Stable reason code for the machine-readable `reason` field
    pub fn reason_code(&self) -> &str {
        match self {
            // One shared reason for the whole auth trio: expiry, signature
            // and parse failures must be indistinguishable to the caller.
            AppError::MalformedCredential
            | AppError::InvalidSignature
            | AppError::ExpiredCredential => "invalid_credential",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::MfaRequired => "mfa_required",
            AppError::MfaInvalid => "mfa_invalid",
            AppError::InsufficientPermission { .. } => "insufficient_permission",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::ThreatDetected { .. } => "threat_detected",
            AppError::ValidationFailed { .. } => "validation_failed",
            AppError::EncryptionFailure => "encryption_failure",
            AppError::AuditWriteFailure => "audit_write_failure",
            AppError::NotFound(_) => "not_found",
            AppError::Config(_) => "config_error",
            AppError::StateStore(_) => "state_store_error",
            AppError::Io(_) | AppError::Internal(_) => "internal_error",
        }
    }
}

/// HTTP status mapping
impl From<&AppError> for (u16, String) {
    fn from(err: &AppError) -> (u16, String) {
        match err {
            AppError::MalformedCredential
            | AppError::InvalidSignature
            | AppError::ExpiredCredential
            | AppError::InvalidCredentials
            | AppError::MfaInvalid => (401, "UNAUTHORIZED".to_string()),
            AppError::MfaRequired => (400, "MFA_REQUIRED".to_string()),
            AppError::InsufficientPermission { .. } => (403, "FORBIDDEN".to_string()),
            AppError::ThreatDetected { .. } => (403, "THREAT_BLOCKED".to_string()),
            AppError::RateLimited { .. } => (429, "RATE_LIMITED".to_string()),
            AppError::ValidationFailed { .. } => (400, "BAD_REQUEST".to_string()),
            AppError::NotFound(_) => (404, "NOT_FOUND".to_string()),
            AppError::StateStore(_) => (503, "SERVICE_UNAVAILABLE".to_string()),
            // Fail-closed protections and everything else collapse to 500
            // with no internal detail.
            _ => (500, "INTERNAL_ERROR".to_string()),
        }
    }
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = (&self).into();

        let body = match &self {
            // Identical body for the auth trio; no oracle on which check
            // failed, no internal detail.
            AppError::MalformedCredential
            | AppError::InvalidSignature
            | AppError::ExpiredCredential => {
                ErrorResponse::new(&code, "invalid or expired credentials")
                    .with_reason(self.reason_code())
            }
            AppError::RateLimited {
                reason,
                retry_after,
            } => ErrorResponse::new(&code, "too many requests")
                .with_reason(reason)
                .with_retry_after(*retry_after),
            AppError::ThreatDetected { .. } => {
                ErrorResponse::new(&code, "request blocked by security policy")
                    .with_reason(self.reason_code())
            }
            AppError::ValidationFailed { violations } => {
                ErrorResponse::new(&code, "input validation failed")
                    .with_reason(self.reason_code())
                    .with_violations(violations.clone())
            }
            AppError::InsufficientPermission { required } => {
                ErrorResponse::new(&code, &format!("missing permission: {}", required))
                    .with_reason(self.reason_code())
            }
            AppError::StateStore(_) => ErrorResponse::new(&code, "service temporarily unavailable")
                .with_reason(self.reason_code()),
            // 500-class responses never leak the inner message.
            AppError::EncryptionFailure
            | AppError::AuditWriteFailure
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Config(_) => {
                ErrorResponse::new(&code, "internal error").with_reason(self.reason_code())
            }
            _ => ErrorResponse::new(&code, &self.to_string()).with_reason(self.reason_code()),
        };

        let retry_after = match &self {
            AppError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        };

        let mut response = (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response();

        if let Some(seconds) = retry_after {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
