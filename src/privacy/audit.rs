//! Compliance Audit Ledger
//!
//! Classification policy per resource class, an append-only access
//! ledger, and retention scanning. Entries are never edited or deleted by
//! the gateway; the retention scan only reports what an external purge
//! job should act on.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::info;

use crate::error::Result;

/// Sensitivity tier governing encryption/retention policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationLevel {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl fmt::Display for ClassificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassificationLevel::Public => "public",
            ClassificationLevel::Internal => "internal",
            ClassificationLevel::Confidential => "confidential",
            ClassificationLevel::Restricted => "restricted",
        };
        write!(f, "{}", s)
    }
}

/// Static policy for one resource class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationPolicy {
    pub level: ClassificationLevel,
    pub retention_days: i64,
    pub requires_consent: bool,
}

/// Policy table keyed by resource class name.
///
/// Classes not present fall back to the most restrictive policy.
#[derive(Debug, Clone)]
pub struct ClassificationTable {
    policies: HashMap<String, ClassificationPolicy>,
    fallback: ClassificationPolicy,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            "assessment_data".to_string(),
            ClassificationPolicy {
                level: ClassificationLevel::Restricted,
                retention_days: 2555, // 7 years
                requires_consent: true,
            },
        );
        policies.insert(
            "analytics_data".to_string(),
            ClassificationPolicy {
                level: ClassificationLevel::Internal,
                retention_days: 1095, // 3 years
                requires_consent: false,
            },
        );
        policies.insert(
            "system_logs".to_string(),
            ClassificationPolicy {
                level: ClassificationLevel::Confidential,
                retention_days: 365,
                requires_consent: false,
            },
        );

        Self {
            policies,
            fallback: ClassificationPolicy {
                level: ClassificationLevel::Restricted,
                retention_days: 365,
                requires_consent: true,
            },
        }
    }
}

impl ClassificationTable {
    pub fn new(policies: HashMap<String, ClassificationPolicy>) -> Self {
        Self {
            policies,
            ..Default::default()
        }
    }

    pub fn policy_for(&self, resource_class: &str) -> &ClassificationPolicy {
        self.policies.get(resource_class).unwrap_or(&self.fallback)
    }

    pub fn classes(&self) -> impl Iterator<Item = (&String, &ClassificationPolicy)> {
        self.policies.iter()
    }
}

/// One immutable record of a classified-resource access
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub principal_id: String,
    pub action: String,
    pub resource_class: String,
    pub classification: ClassificationLevel,
    pub purpose: String,
    pub success: bool,
}

/// Trail query filter
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub principal_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Per-class retention scan finding
#[derive(Debug, Clone, Serialize)]
pub struct RetentionReport {
    pub resource_class: String,
    pub retention_days: i64,
    pub expired_count: usize,
    pub oldest: DateTime<Utc>,
}

/// Append-only audit ledger over the classification table
pub struct AuditLedger {
    table: ClassificationTable,
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLedger {
    pub fn new(table: ClassificationTable) -> Self {
        Self {
            table,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn table(&self) -> &ClassificationTable {
        &self.table
    }

    /// Append one entry, stamped with the class's classification level.
    ///
    /// Returns the appended entry; an `Err` here means the access record
    /// was NOT persisted and the caller must fail the request.
    pub fn log_access(
        &self,
        principal_id: &str,
        action: &str,
        resource_class: &str,
        purpose: &str,
        success: bool,
    ) -> Result<AuditEntry> {
        let policy = self.table.policy_for(resource_class);
        let entry = AuditEntry {
            timestamp: Utc::now(),
            principal_id: principal_id.to_string(),
            action: action.to_string(),
            resource_class: resource_class.to_string(),
            classification: policy.level,
            purpose: purpose.to_string(),
            success,
        };

        self.entries.write().push(entry.clone());
        info!(
            principal_id,
            action,
            resource_class,
            classification = %entry.classification,
            success,
            "audit entry recorded"
        );

        Ok(entry)
    }

    /// Entries matching the filter, oldest first
    pub fn trail(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| {
                filter
                    .principal_id
                    .as_ref()
                    .is_none_or(|id| &e.principal_id == id)
                    && filter.from.is_none_or(|from| e.timestamp >= from)
                    && filter.to.is_none_or(|to| e.timestamp <= to)
            })
            .cloned()
            .collect()
    }

    /// For each configured resource class, report entries older than its
    /// retention horizon. Reporting only; purge execution is external.
    pub fn scan_retention(&self, now: DateTime<Utc>) -> Vec<RetentionReport> {
        let entries = self.entries.read();
        let mut reports = Vec::new();

        for (class, policy) in self.table.classes() {
            let horizon = now - Duration::days(policy.retention_days);
            let expired: Vec<&AuditEntry> = entries
                .iter()
                .filter(|e| &e.resource_class == class && e.timestamp < horizon)
                .collect();

            if let Some(oldest) = expired.iter().map(|e| e.timestamp).min() {
                reports.push(RetentionReport {
                    resource_class: class.clone(),
                    retention_days: policy.retention_days,
                    expired_count: expired.len(),
                    oldest,
                });
            }
        }

        reports.sort_by(|a, b| a.resource_class.cmp(&b.resource_class));
        reports
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Test/backfill hook: append a fully-specified entry as-is
    #[doc(hidden)]
    pub fn append_raw(&self, entry: AuditEntry) {
        self.entries.write().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backdated(resource_class: &str, days_ago: i64) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now() - Duration::days(days_ago),
            principal_id: "p-1".into(),
            action: "read".into(),
            resource_class: resource_class.into(),
            classification: ClassificationLevel::Confidential,
            purpose: "patient_care".into(),
            success: true,
        }
    }

    #[test]
    fn test_log_access_stamps_classification() {
        let ledger = AuditLedger::new(ClassificationTable::default());
        let entry = ledger
            .log_access("p-1", "create_assessment", "assessment_data", "treatment", true)
            .unwrap();

        assert_eq!(entry.classification, ClassificationLevel::Restricted);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_unknown_class_falls_back_restrictive() {
        let ledger = AuditLedger::new(ClassificationTable::default());
        let entry = ledger
            .log_access("p-1", "read", "mystery_data", "ops", true)
            .unwrap();

        assert_eq!(entry.classification, ClassificationLevel::Restricted);
    }

    #[test]
    fn test_retention_scan_reports_expired_only() {
        let ledger = AuditLedger::new(ClassificationTable::default());

        // 365-day class: one entry 400 days old, one 10 days old
        ledger.append_raw(backdated("system_logs", 400));
        ledger.append_raw(backdated("system_logs", 10));

        let reports = ledger.scan_retention(Utc::now());
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].resource_class, "system_logs");
        assert_eq!(reports[0].retention_days, 365);
        assert!(reports[0].expired_count >= 1);

        // Scan never deletes
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_retention_scan_respects_per_class_horizon() {
        let ledger = AuditLedger::new(ClassificationTable::default());

        // 400 days is expired for system_logs (365) but not for
        // assessment_data (2555)
        ledger.append_raw(backdated("system_logs", 400));
        ledger.append_raw(backdated("assessment_data", 400));

        let reports = ledger.scan_retention(Utc::now());
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].resource_class, "system_logs");
    }

    #[test]
    fn test_trail_filters() {
        let ledger = AuditLedger::new(ClassificationTable::default());
        ledger.log_access("p-1", "read", "assessment_data", "care", true).unwrap();
        ledger.log_access("p-2", "read", "assessment_data", "care", true).unwrap();
        ledger.log_access("p-1", "export", "analytics_data", "analytics", false).unwrap();

        let by_principal = ledger.trail(&AuditFilter {
            principal_id: Some("p-1".into()),
            ..Default::default()
        });
        assert_eq!(by_principal.len(), 2);

        let recent = ledger.trail(&AuditFilter {
            from: Some(Utc::now() - Duration::hours(1)),
            ..Default::default()
        });
        assert_eq!(recent.len(), 3);
    }
}
