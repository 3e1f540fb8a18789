//! Principal Repository
//!
//! In-memory keyed store for principals. The persistent-store collaborator
//! is an external concern; this repository holds the gateway's working set
//! and enforces the no-hard-delete rule (deactivation only).

use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::models::principal::{NewPrincipal, Principal};
use crate::security::auth::hash_secret;
use crate::security::rbac::Role;

/// Concurrent in-memory principal store
#[derive(Debug, Default)]
pub struct PrincipalRepository {
    /// Principals keyed by id
    by_id: DashMap<String, Principal>,
    /// username -> id index
    username_index: DashMap<String, String>,
}

impl PrincipalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-seeded with the development accounts
    pub fn development() -> Self {
        let repo = Self::new();

        for (username, email, role, secret) in [
            ("admin", "admin@medgate.local", Role::Admin, "admin123"),
            ("doctor", "doctor@medgate.local", Role::Doctor, "doctor123"),
            ("analyst", "analyst@medgate.local", Role::Analyst, "analyst123"),
            ("viewer", "viewer@medgate.local", Role::Viewer, "viewer123"),
        ] {
            let _ = repo.register(NewPrincipal {
                username: username.to_string(),
                email: email.to_string(),
                role,
                secret: secret.to_string(),
                mfa_enabled: false,
            });
        }

        repo
    }

    /// Register a new principal; usernames are unique
    pub fn register(&self, input: NewPrincipal) -> Result<Principal> {
        if self.username_index.contains_key(&input.username) {
            return Err(AppError::Internal(format!(
                "username already registered: {}",
                input.username
            )));
        }

        let hash = hash_secret(&input.secret)?;
        let mut principal = Principal::new(&input.username, &input.email, input.role, hash);
        principal.mfa_enabled = input.mfa_enabled;

        self.username_index
            .insert(principal.username.clone(), principal.id.clone());
        self.by_id.insert(principal.id.clone(), principal.clone());

        Ok(principal)
    }

    pub fn find_by_id(&self, id: &str) -> Option<Principal> {
        self.by_id.get(id).map(|p| p.clone())
    }

    pub fn find_by_username(&self, username: &str) -> Option<Principal> {
        let id = self.username_index.get(username)?.clone();
        self.find_by_id(&id)
    }

    /// Record the outcome of a login attempt
    pub fn record_login(&self, id: &str, success: bool) {
        if let Some(mut p) = self.by_id.get_mut(id) {
            if success {
                p.touch_login();
            } else {
                p.record_failure();
            }
        }
    }

    /// Deactivate a principal (no hard delete)
    pub fn deactivate(&self, id: &str) -> Result<()> {
        let mut p = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("principal not found: {}", id)))?;
        p.active = false;
        Ok(())
    }

    /// Change a principal's role; already-issued credentials keep their
    /// permission snapshot until expiry.
    pub fn set_role(&self, id: &str, role: Role) -> Result<()> {
        let mut p = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("principal not found: {}", id)))?;
        p.role = role;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let repo = PrincipalRepository::new();
        let p = repo
            .register(NewPrincipal {
                username: "jdoe".into(),
                email: "jdoe@example.com".into(),
                role: Role::Nurse,
                secret: "s3cret-pass".into(),
                mfa_enabled: false,
            })
            .unwrap();

        assert_eq!(repo.find_by_username("jdoe").unwrap().id, p.id);
        assert_eq!(repo.find_by_id(&p.id).unwrap().username, "jdoe");
        // Secret never stored in the clear
        assert_ne!(repo.find_by_id(&p.id).unwrap().credential_hash, "s3cret-pass");
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let repo = PrincipalRepository::new();
        let input = NewPrincipal {
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            role: Role::Viewer,
            secret: "s3cret-pass".into(),
            mfa_enabled: false,
        };

        assert!(repo.register(input.clone()).is_ok());
        assert!(repo.register(input).is_err());
    }

    #[test]
    fn test_deactivate_keeps_record() {
        let repo = PrincipalRepository::development();
        let p = repo.find_by_username("viewer").unwrap();

        repo.deactivate(&p.id).unwrap();

        let after = repo.find_by_id(&p.id).unwrap();
        assert!(!after.active);
        assert!(!after.can_authenticate());
    }

    #[test]
    fn test_development_seed_accounts() {
        let repo = PrincipalRepository::development();
        assert_eq!(repo.count(), 4);
        assert_eq!(repo.find_by_username("admin").unwrap().role, Role::Admin);
    }
}
