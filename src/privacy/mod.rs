//! Privacy Module
//!
//! Data-protection half of the gateway:
//! - Symmetric authenticated encryption (AES-256-GCM)
//! - Deterministic pseudonymization and generalization for anonymized
//!   export
//! - Append-only compliance audit ledger with retention scanning

pub mod anonymize;
pub mod audit;
pub mod encryption;

pub use anonymize::Anonymizer;
pub use audit::{AuditEntry, AuditFilter, AuditLedger, ClassificationLevel, ClassificationTable, RetentionReport};
pub use encryption::EncryptionService;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;

/// Facade over the three privacy parts, owned by the request gateway.
pub struct PrivacyEngine {
    encryption: Arc<EncryptionService>,
    anonymizer: Anonymizer,
    ledger: AuditLedger,
}

impl PrivacyEngine {
    pub fn new(
        encryption: Arc<EncryptionService>,
        anonymizer: Anonymizer,
        ledger: AuditLedger,
    ) -> Self {
        Self {
            encryption,
            anonymizer,
            ledger,
        }
    }

    /// In-memory engine with an ephemeral key (tests, development)
    pub fn development() -> Self {
        Self::new(
            Arc::new(EncryptionService::ephemeral()),
            Anonymizer::new("dev-anonymization-secret"),
            AuditLedger::new(ClassificationTable::default()),
        )
    }

    pub fn encryption(&self) -> &EncryptionService {
        &self.encryption
    }

    pub fn anonymizer(&self) -> &Anonymizer {
        &self.anonymizer
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// Encrypt a classified value for storage/transport
    pub fn encrypt(&self, plaintext: &[u8], classification: ClassificationLevel) -> Result<String> {
        self.encryption.encrypt(plaintext, classification)
    }

    /// Decrypt a previously encrypted value
    pub fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>> {
        self.encryption.decrypt(ciphertext)
    }

    /// Stable display-safe pseudonym for a PII value
    pub fn pseudonymize(&self, field_type: &str, value: &str) -> String {
        self.anonymizer.pseudonymize(field_type, value)
    }

    /// Anonymized copy of a record for analytics export
    pub fn anonymize_record(&self, record: &Value) -> Value {
        self.anonymizer.anonymize_record(record)
    }

    /// Append one audit entry for a classified-resource access
    pub fn log_access(
        &self,
        principal_id: &str,
        action: &str,
        resource_class: &str,
        purpose: &str,
        success: bool,
    ) -> Result<AuditEntry> {
        self.ledger
            .log_access(principal_id, action, resource_class, purpose, success)
    }

    /// Report audit entries past their retention horizon
    pub fn scan_retention(&self, now: DateTime<Utc>) -> Vec<RetentionReport> {
        self.ledger.scan_retention(now)
    }

    /// Filtered view of the audit ledger
    pub fn audit_trail(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.ledger.trail(filter)
    }
}
