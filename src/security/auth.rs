//! Authentication Module
//!
//! Token Service (JWT issue/verify with permission snapshots) and the
//! credential exchange (login / refresh / MFA).
//!
//! Verification is pure: a fixed secret held in process memory, no I/O.
//! The three verification failures (malformed, bad signature, expired)
//! are distinct internally but collapse to one external 401 surface in
//! `error.rs` so the API leaks no verification oracle.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::principal::Principal;
use crate::models::principal_repository::PrincipalRepository;
use crate::security::rbac::PermissionRegistry;

/// Credential kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by every credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal id)
    pub sub: String,
    pub username: String,
    /// Role name at issuance
    pub role: String,
    /// Permission snapshot taken from the registry at issuance time;
    /// later registry/role changes do not alter this credential.
    pub permissions: Vec<String>,
    /// Issued-at (unix seconds)
    pub iat: usize,
    /// Expiry (unix seconds)
    pub exp: usize,
    pub kind: TokenKind,
    /// Unique token id
    pub jti: String,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Issued access/refresh credential pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Stateless JWT issue/verify service (HS256)
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
    registry: Arc<PermissionRegistry>,
}

impl TokenService {
    pub fn new(
        secret: &str,
        access_ttl_seconds: u64,
        refresh_ttl_seconds: u64,
        registry: Arc<PermissionRegistry>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_seconds,
            refresh_ttl_seconds,
            registry,
        }
    }

    /// Development token service: short-lived access, default policy
    pub fn development() -> Self {
        Self::new(
            "dev-secret-change-in-production-min-32-chars",
            30 * 60,
            7 * 24 * 3600,
            Arc::new(PermissionRegistry::default()),
        )
    }

    /// Issue an access/refresh pair for a principal, embedding the
    /// registry's permission snapshot for its role.
    pub fn issue(&self, principal: &Principal) -> Result<TokenPair> {
        let access = self.issue_one(principal, TokenKind::Access, self.access_ttl_seconds)?;
        let refresh = self.issue_one(principal, TokenKind::Refresh, self.refresh_ttl_seconds)?;

        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
            expires_in: self.access_ttl_seconds,
        })
    }

    fn issue_one(&self, principal: &Principal, kind: TokenKind, ttl: u64) -> Result<String> {
        let now = Utc::now().timestamp() as usize;
        let role = principal.role.to_string();

        let claims = Claims {
            sub: principal.id.clone(),
            username: principal.username.clone(),
            permissions: self.registry.snapshot(&role),
            role,
            iat: now,
            exp: now + ttl as usize,
            kind,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("token encoding failed: {}", e)))
    }

    /// Verify a credential and return its claims.
    ///
    /// Signature and structure are checked first; expiry is then checked
    /// on the decoded claims, so an expired credential reports
    /// `ExpiredCredential` whenever its signature is otherwise valid.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = Default::default();

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => AppError::InvalidSignature,
                _ => AppError::MalformedCredential,
            }
        })?;

        let claims = data.claims;
        if Utc::now().timestamp() > claims.exp as i64 {
            return Err(AppError::ExpiredCredential);
        }

        Ok(claims)
    }

    /// Verify a credential and require it to be an access token
    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AppError::MalformedCredential);
        }
        Ok(claims)
    }

    pub fn access_ttl_seconds(&self) -> u64 {
        self.access_ttl_seconds
    }
}

/// Hash a login secret with Argon2id
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("secret hashing failed: {}", e)))
}

/// Verify a login secret against its stored Argon2id hash
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Generate a 6-character hex second-factor code
pub fn generate_mfa_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..0x0100_0000);
    format!("{:06x}", n)
}

/// Verify a second-factor code.
///
/// TODO: back this with TOTP once enrollment is wired into registration;
/// for now the shape check mirrors the delivery format.
pub fn verify_mfa_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Successful login payload
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub pair: TokenPair,
    pub principal: Principal,
}

/// Credential exchange: login and refresh against the principal store
pub struct AuthService {
    tokens: Arc<TokenService>,
    principals: Arc<PrincipalRepository>,
}

impl AuthService {
    pub fn new(tokens: Arc<TokenService>, principals: Arc<PrincipalRepository>) -> Self {
        Self { tokens, principals }
    }

    /// Exchange credentials for a token pair.
    ///
    /// Unknown usernames, wrong secrets, and deactivated principals all
    /// report `InvalidCredentials`.
    pub fn login(
        &self,
        username: &str,
        secret: &str,
        mfa_code: Option<&str>,
    ) -> Result<TokenBundle> {
        let principal = match self.principals.find_by_username(username) {
            Some(p) => p,
            None => {
                tracing::warn!(username, "login attempt for unknown principal");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !principal.can_authenticate() || !verify_secret(secret, &principal.credential_hash) {
            self.principals.record_login(&principal.id, false);
            tracing::warn!(principal_id = %principal.id, "failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        if principal.mfa_enabled {
            match mfa_code {
                None => return Err(AppError::MfaRequired),
                Some(code) if !verify_mfa_code(code) => {
                    self.principals.record_login(&principal.id, false);
                    return Err(AppError::MfaInvalid);
                }
                Some(_) => {}
            }
        }

        self.principals.record_login(&principal.id, true);
        let pair = self.tokens.issue(&principal)?;
        tracing::info!(principal_id = %principal.id, role = %principal.role, "login succeeded");

        Ok(TokenBundle { pair, principal })
    }

    /// Exchange a refresh credential for a fresh pair. A refresh is an
    /// issuance: the permission snapshot is re-taken from the registry
    /// against the principal's current role.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenBundle> {
        let claims = self.tokens.verify(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AppError::MalformedCredential);
        }

        let principal = self
            .principals
            .find_by_id(&claims.sub)
            .filter(|p| p.can_authenticate())
            .ok_or(AppError::InvalidCredentials)?;

        let pair = self.tokens.issue(&principal)?;
        Ok(TokenBundle { pair, principal })
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}
