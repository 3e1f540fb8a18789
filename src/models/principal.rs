//! Principal Model
//!
//! An authenticated actor known to the system. Principals are never hard
//! deleted; deactivation flips `active` and leaves the record in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::security::rbac::Role;

/// Registration input
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrincipal {
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Plain secret, hashed before storage
    pub secret: String,
    pub mfa_enabled: bool,
}

/// An authenticated actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Deactivated principals cannot log in or refresh
    pub active: bool,
    pub verified: bool,
    pub mfa_enabled: bool,
    /// Argon2id hash of the login secret
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub failed_login_attempts: u32,
}

impl Principal {
    /// Create a new active, unverified principal with a pre-hashed secret
    pub fn new(username: &str, email: &str, role: Role, credential_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            role,
            active: true,
            verified: false,
            mfa_enabled: false,
            credential_hash,
            created_at: Utc::now(),
            last_login: None,
            failed_login_attempts: 0,
        }
    }

    /// Record a successful login
    pub fn touch_login(&mut self) {
        self.last_login = Some(Utc::now());
        self.failed_login_attempts = 0;
    }

    /// Record a failed login attempt
    pub fn record_failure(&mut self) {
        self.failed_login_attempts = self.failed_login_attempts.saturating_add(1);
    }

    /// Whether this principal may authenticate at all
    pub fn can_authenticate(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_principal_defaults() {
        let p = Principal::new("jdoe", "jdoe@example.com", Role::Doctor, "hash".into());

        assert!(p.active);
        assert!(!p.verified);
        assert!(!p.id.is_empty());
        assert_eq!(p.failed_login_attempts, 0);
        assert!(p.last_login.is_none());
    }

    #[test]
    fn test_login_bookkeeping() {
        let mut p = Principal::new("jdoe", "jdoe@example.com", Role::Nurse, "hash".into());

        p.record_failure();
        p.record_failure();
        assert_eq!(p.failed_login_attempts, 2);

        p.touch_login();
        assert_eq!(p.failed_login_attempts, 0);
        assert!(p.last_login.is_some());
    }

    #[test]
    fn test_credential_hash_not_serialized() {
        let p = Principal::new("jdoe", "jdoe@example.com", Role::Viewer, "secret-hash".into());
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
