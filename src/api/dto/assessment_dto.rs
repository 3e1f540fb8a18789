//! Assessment DTOs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use validator::Validate;

use crate::error::FieldViolation;

/// Create-assessment request shape. Structural validation runs inside the
/// gateway's INPUT_VALIDATE stage via `validate_create_assessment`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAssessmentRequest {
    #[validate(length(min = 1, max = 50))]
    pub symptoms: Vec<String>,
    /// Per-symptom severity, 0-10
    pub severity: HashMap<String, u8>,
    #[serde(default)]
    pub duration: HashMap<String, String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[validate(range(min = 0, max = 130))]
    pub age: u32,
    #[validate(length(min = 1, max = 32))]
    pub gender: String,
}

/// Gateway route validator for assessment creation: shape first (serde),
/// then field constraints (validator).
pub fn validate_create_assessment(body: &Value) -> Result<(), Vec<FieldViolation>> {
    let request: CreateAssessmentRequest = serde_json::from_value(body.clone())
        .map_err(|e| vec![FieldViolation::new("body", e.to_string())])?;

    if let Some(bad) = request.severity.values().find(|v| **v > 10) {
        return Err(vec![FieldViolation::new(
            "severity",
            format!("severity values must be 0-10, got {}", bad),
        )]);
    }

    request
        .validate()
        .map_err(crate::api::dto::violations_from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "symptoms": ["fever", "cough"],
            "severity": {"fever": 6, "cough": 3},
            "age": 37,
            "gender": "female",
        })
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_create_assessment(&valid_body()).is_ok());
    }

    #[test]
    fn test_wrong_shape_reports_body_violation() {
        let violations =
            validate_create_assessment(&json!({"symptoms": "fever"})).unwrap_err();
        assert_eq!(violations[0].field, "body");
    }

    #[test]
    fn test_empty_symptoms_rejected() {
        let mut body = valid_body();
        body["symptoms"] = json!([]);
        let violations = validate_create_assessment(&body).unwrap_err();
        assert!(violations.iter().any(|v| v.field == "symptoms"));
    }

    #[test]
    fn test_age_out_of_range_rejected() {
        let mut body = valid_body();
        body["age"] = json!(200);
        let violations = validate_create_assessment(&body).unwrap_err();
        assert!(violations.iter().any(|v| v.field == "age"));
    }

    #[test]
    fn test_severity_scale_enforced() {
        let mut body = valid_body();
        body["severity"] = json!({"fever": 11});
        let violations = validate_create_assessment(&body).unwrap_err();
        assert!(violations.iter().any(|v| v.field == "severity"));
    }
}
