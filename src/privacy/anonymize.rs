//! Anonymization
//!
//! Deterministic pseudonymization and generalization for analytics
//! export. Pseudonyms are a one-way keyed hash of `(field_type, value)`:
//! identical inputs under the same deployment secret always produce the
//! same token, so anonymized datasets stay joinable without recovering
//! the source value.

use chrono::Utc;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// PII fields replaced with pseudonyms in exported records
const PII_FIELDS: [&str; 5] = ["name", "email", "phone", "address", "medical_id"];

/// Deterministic anonymizer keyed by a deployment secret
#[derive(Debug, Clone)]
pub struct Anonymizer {
    secret: String,
}

impl Anonymizer {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    /// Derive a stable display-safe pseudonym for a PII value.
    ///
    /// The derivation is SHA-256 over `{field_type}:{value}:{secret}`;
    /// only a short hex prefix ever appears in output.
    pub fn pseudonymize(&self, field_type: &str, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", field_type, value, self.secret));
        let digest = hasher.finalize();
        let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();

        match field_type {
            "name" => format!("Patient_{}", &hex[..8]),
            "email" => format!("patient_{}@example.com", &hex[..8]),
            "phone" => format!("***-***-{}", &hex[..4]),
            _ => format!("***_{}", &hex[..6]),
        }
    }

    /// Generalize an age into one of six fixed buckets
    pub fn generalize_age(age: i64) -> &'static str {
        match age {
            i64::MIN..=17 => "0-17",
            18..=29 => "18-29",
            30..=44 => "30-44",
            45..=59 => "45-59",
            60..=74 => "60-74",
            _ => "75+",
        }
    }

    /// Generalize a free-form location into a coarse region
    pub fn generalize_location(location: &str) -> &'static str {
        let location = location.to_lowercase();
        let contains_any =
            |needles: &[&str]| needles.iter().any(|n| location.contains(n));

        if contains_any(&["ca", "california", "nevada", "oregon", "washington"]) {
            "West Coast"
        } else if contains_any(&["ny", "new york", "nj", "pennsylvania", "massachusetts"]) {
            "Northeast"
        } else if contains_any(&["tx", "texas", "florida", "georgia", "alabama"]) {
            "Southeast"
        } else {
            "Other US"
        }
    }

    /// Produce an anonymized copy of a record.
    ///
    /// PII fields become pseudonyms, `age` becomes `age_range`, `location`
    /// becomes `region`; everything else passes through unchanged. The
    /// result is stamped with an anonymization id and timestamp.
    pub fn anonymize_record(&self, record: &Value) -> Value {
        let source = match record.as_object() {
            Some(map) => map,
            None => return record.clone(),
        };

        let mut out = Map::new();
        for (key, value) in source {
            if PII_FIELDS.contains(&key.as_str()) {
                let original = value.as_str().unwrap_or_default();
                out.insert(key.clone(), json!(self.pseudonymize(key, original)));
            } else if key == "age" {
                if let Some(age) = value.as_i64() {
                    out.insert("age_range".to_string(), json!(Self::generalize_age(age)));
                }
            } else if key == "location" {
                let location = value.as_str().unwrap_or_default();
                out.insert(
                    "region".to_string(),
                    json!(Self::generalize_location(location)),
                );
            } else {
                out.insert(key.clone(), value.clone());
            }
        }

        out.insert(
            "anonymization_id".to_string(),
            json!(Uuid::new_v4().simple().to_string()),
        );
        out.insert("anonymized_at".to_string(), json!(Utc::now().to_rfc3339()));

        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_pseudonyms_are_deterministic() {
        let anonymizer = Anonymizer::new("deployment-secret");

        let a = anonymizer.pseudonymize("name", "Jane Doe");
        let b = anonymizer.pseudonymize("name", "Jane Doe");
        assert_eq!(a, b);
        assert!(a.starts_with("Patient_"));
        assert!(!a.contains("Jane"));
    }

    #[test]
    fn test_pseudonyms_vary_by_field_value_and_secret() {
        let anonymizer = Anonymizer::new("deployment-secret");
        let other = Anonymizer::new("other-secret");

        assert_ne!(
            anonymizer.pseudonymize("name", "Jane Doe"),
            anonymizer.pseudonymize("name", "John Doe")
        );
        assert_ne!(
            anonymizer.pseudonymize("name", "Jane Doe"),
            other.pseudonymize("name", "Jane Doe")
        );
    }

    #[test]
    fn test_pseudonym_formats_per_field() {
        let anonymizer = Anonymizer::new("s");

        assert!(anonymizer.pseudonymize("email", "a@b.com").ends_with("@example.com"));
        assert!(anonymizer.pseudonymize("phone", "555-0100").starts_with("***-***-"));
        assert!(anonymizer.pseudonymize("medical_id", "MRN-1").starts_with("***_"));
    }

    #[rstest]
    #[case(5, "0-17")]
    #[case(17, "0-17")]
    #[case(18, "18-29")]
    #[case(29, "18-29")]
    #[case(37, "30-44")]
    #[case(45, "45-59")]
    #[case(60, "60-74")]
    #[case(74, "60-74")]
    #[case(75, "75+")]
    #[case(101, "75+")]
    fn test_age_buckets(#[case] age: i64, #[case] expected: &str) {
        assert_eq!(Anonymizer::generalize_age(age), expected);
    }

    #[rstest]
    #[case("Austin, TX", "Southeast")]
    #[case("Portland, Oregon", "West Coast")]
    #[case("Buffalo, New York", "Northeast")]
    #[case("Denver, CO", "Other US")]
    fn test_location_regions(#[case] location: &str, #[case] expected: &str) {
        assert_eq!(Anonymizer::generalize_location(location), expected);
    }

    #[test]
    fn test_anonymize_record_is_repeatable() {
        let anonymizer = Anonymizer::new("deployment-secret");
        let record = serde_json::json!({
            "name": "Jane Doe",
            "age": 37,
            "location": "Austin, TX",
            "symptoms": ["fever", "cough"]
        });

        let first = anonymizer.anonymize_record(&record);
        let second = anonymizer.anonymize_record(&record);

        // Pseudonyms are stable across runs
        assert_eq!(first["name"], second["name"]);
        assert_eq!(first["age_range"], "30-44");
        assert_eq!(first["region"], "Southeast");

        // Raw quasi-identifiers are gone; non-PII passes through
        assert!(first.get("age").is_none());
        assert!(first.get("location").is_none());
        assert_eq!(first["symptoms"], record["symptoms"]);

        // Each export run gets its own stamp
        assert!(first.get("anonymization_id").is_some());
        assert!(first.get("anonymized_at").is_some());
        assert_ne!(first["anonymization_id"], second["anonymization_id"]);
    }

    #[test]
    fn test_non_object_passes_through() {
        let anonymizer = Anonymizer::new("s");
        assert_eq!(anonymizer.anonymize_record(&serde_json::json!(42)), 42);
    }
}
