//! Permission Registry
//!
//! Role-based access control as a pure lookup over an explicit
//! `RolePolicy` configuration object. The registry holds no mutable state:
//! role changes never touch already-issued credentials, whose permission
//! snapshots were taken at issuance time.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Role assigned to a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full system administrator
    Admin,
    Doctor,
    Nurse,
    Patient,
    Analyst,
    /// Read-only access
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Patient => "patient",
            Role::Analyst => "analyst",
            Role::Viewer => "viewer",
        };
        write!(f, "{}", s)
    }
}

impl Role {
    /// Parse a role name; unknown names yield `None` (and therefore an
    /// empty permission set from the registry).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "doctor" => Some(Role::Doctor),
            "nurse" => Some(Role::Nurse),
            "patient" => Some(Role::Patient),
            "analyst" => Some(Role::Analyst),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles allowed to touch patient-identifying data
    pub fn is_clinical(&self) -> bool {
        matches!(self, Role::Admin | Role::Doctor | Role::Nurse)
    }
}

/// Atomic capability grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "read:assessments")]
    ReadAssessments,
    #[serde(rename = "write:assessments")]
    WriteAssessments,
    #[serde(rename = "delete:assessments")]
    DeleteAssessments,
    #[serde(rename = "read:analytics")]
    ReadAnalytics,
    #[serde(rename = "write:analytics")]
    WriteAnalytics,
    #[serde(rename = "admin:access")]
    AdminAccess,
    #[serde(rename = "access:patient_data")]
    PatientData,
    #[serde(rename = "export:data")]
    ExportData,
}

impl Permission {
    /// Every permission the system defines
    pub fn all() -> Vec<Permission> {
        vec![
            Permission::ReadAssessments,
            Permission::WriteAssessments,
            Permission::DeleteAssessments,
            Permission::ReadAnalytics,
            Permission::WriteAnalytics,
            Permission::AdminAccess,
            Permission::PatientData,
            Permission::ExportData,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadAssessments => "read:assessments",
            Permission::WriteAssessments => "write:assessments",
            Permission::DeleteAssessments => "delete:assessments",
            Permission::ReadAnalytics => "read:analytics",
            Permission::WriteAnalytics => "write:analytics",
            Permission::AdminAccess => "admin:access",
            Permission::PatientData => "access:patient_data",
            Permission::ExportData => "export:data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read:assessments" => Some(Permission::ReadAssessments),
            "write:assessments" => Some(Permission::WriteAssessments),
            "delete:assessments" => Some(Permission::DeleteAssessments),
            "read:analytics" => Some(Permission::ReadAnalytics),
            "write:analytics" => Some(Permission::WriteAnalytics),
            "admin:access" => Some(Permission::AdminAccess),
            "access:patient_data" => Some(Permission::PatientData),
            "export:data" => Some(Permission::ExportData),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role-to-permission mapping, constructed per deployment and handed to
/// the registry rather than living as an ambient constant.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    grants: HashMap<Role, Vec<Permission>>,
}

impl RolePolicy {
    pub fn new(grants: HashMap<Role, Vec<Permission>>) -> Self {
        Self { grants }
    }

    /// Override the grants for one role
    pub fn with_grants(mut self, role: Role, permissions: Vec<Permission>) -> Self {
        self.grants.insert(role, permissions);
        self
    }
}

impl Default for RolePolicy {
    /// The stock clinical policy. Admin is the union of all permissions;
    /// every other role is an explicit subset.
    fn default() -> Self {
        let mut grants = HashMap::new();

        grants.insert(Role::Admin, Permission::all());
        grants.insert(
            Role::Doctor,
            vec![
                Permission::ReadAssessments,
                Permission::WriteAssessments,
                Permission::ReadAnalytics,
                Permission::PatientData,
            ],
        );
        grants.insert(
            Role::Nurse,
            vec![
                Permission::ReadAssessments,
                Permission::WriteAssessments,
                Permission::PatientData,
            ],
        );
        grants.insert(
            Role::Analyst,
            vec![
                Permission::ReadAssessments,
                Permission::ReadAnalytics,
                Permission::WriteAnalytics,
                Permission::ExportData,
            ],
        );
        grants.insert(Role::Patient, vec![Permission::ReadAssessments]);
        grants.insert(
            Role::Viewer,
            vec![Permission::ReadAssessments, Permission::ReadAnalytics],
        );

        Self { grants }
    }
}

/// Pure role -> permission-set lookup
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    policy: RolePolicy,
}

impl PermissionRegistry {
    pub fn new(policy: RolePolicy) -> Self {
        Self { policy }
    }

    /// Permission set for a role; unknown role names yield the empty set
    /// rather than an error.
    pub fn permissions_for(&self, role: &str) -> HashSet<Permission> {
        Role::parse(role)
            .and_then(|r| self.policy.grants.get(&r))
            .map(|perms| perms.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a role currently carries a permission
    pub fn check(&self, role: &str, permission: Permission) -> bool {
        self.permissions_for(role).contains(&permission)
    }

    /// Permission snapshot for embedding into a credential at issuance
    pub fn snapshot(&self, role: &str) -> Vec<String> {
        let mut perms: Vec<String> = self
            .permissions_for(role)
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        perms.sort();
        perms
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new(RolePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_union_of_all_permissions() {
        let registry = PermissionRegistry::default();
        let admin = registry.permissions_for("admin");

        for p in Permission::all() {
            assert!(admin.contains(&p), "admin missing {}", p);
        }
    }

    #[test]
    fn test_viewer_cannot_write_assessments() {
        let registry = PermissionRegistry::default();
        assert!(!registry.check("viewer", Permission::WriteAssessments));
        assert!(registry.check("viewer", Permission::ReadAssessments));
    }

    #[test]
    fn test_unknown_role_yields_empty_set() {
        let registry = PermissionRegistry::default();
        assert!(registry.permissions_for("superuser").is_empty());
        assert!(!registry.check("superuser", Permission::ReadAssessments));
    }

    #[test]
    fn test_custom_policy_overrides_defaults() {
        let policy =
            RolePolicy::default().with_grants(Role::Viewer, vec![Permission::ExportData]);
        let registry = PermissionRegistry::new(policy);

        assert!(registry.check("viewer", Permission::ExportData));
        assert!(!registry.check("viewer", Permission::ReadAssessments));
    }

    #[test]
    fn test_snapshot_is_sorted_and_stable() {
        let registry = PermissionRegistry::default();
        let a = registry.snapshot("doctor");
        let b = registry.snapshot("doctor");

        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(a, sorted);
    }
}
