//! Risk Assessment Service
//!
//! Reference implementation of the gateway's business-logic collaborator:
//! scores assessments, stores them with sensitive fields encrypted, and
//! serves history/export views. The gateway only ever reads the returned
//! action/resource-class; the scoring itself is replaceable.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::gateway::{DispatchResult, Dispatcher, GatewayRequest, GatewayRoute};
use crate::privacy::{ClassificationLevel, PrivacyEngine};
use crate::security::auth::Claims;

/// Fields encrypted at rest in stored assessments
const SENSITIVE_FIELDS: [&str; 3] = ["symptoms", "medical_history", "medications"];

/// One stored assessment
#[derive(Debug, Clone)]
struct StoredAssessment {
    id: String,
    principal_id: String,
    risk_score: f64,
    severity_level: &'static str,
    recommendations: Vec<String>,
    /// Sensitive payload fields, AES-GCM encrypted
    encrypted_fields: HashMap<String, String>,
    /// Non-sensitive payload subset kept for anonymized export
    export_view: Value,
    created_at: chrono::DateTime<Utc>,
}

/// In-memory assessment service
pub struct RiskAssessmentService {
    privacy: Arc<PrivacyEngine>,
    assessments: RwLock<Vec<StoredAssessment>>,
}

/// Build the assessment collaborator behind the gateway's dispatch trait
pub fn create_assessment_service(privacy: Arc<PrivacyEngine>) -> Box<dyn Dispatcher> {
    Box::new(RiskAssessmentService::new(privacy))
}

impl RiskAssessmentService {
    pub fn new(privacy: Arc<PrivacyEngine>) -> Self {
        Self {
            privacy,
            assessments: RwLock::new(Vec::new()),
        }
    }

    /// Severity-average risk score, capped at 75
    fn risk_score(severity: &Map<String, Value>) -> f64 {
        if severity.is_empty() {
            return 0.0;
        }
        let sum: f64 = severity.values().filter_map(|v| v.as_f64()).sum();
        let avg = sum / severity.len() as f64;
        (avg * 10.0).min(75.0)
    }

    fn severity_level(risk_score: f64) -> &'static str {
        if risk_score > 70.0 {
            "high"
        } else if risk_score > 40.0 {
            "medium"
        } else {
            "low"
        }
    }

    fn recommendations(risk_score: f64) -> Vec<String> {
        let items: &[&str] = if risk_score > 70.0 {
            &[
                "Seek immediate medical attention",
                "Monitor symptoms closely",
                "Follow up with healthcare provider",
            ]
        } else if risk_score > 40.0 {
            &[
                "Schedule appointment with healthcare provider",
                "Monitor symptoms",
                "Maintain healthy lifestyle",
            ]
        } else {
            &[
                "Continue monitoring symptoms",
                "Maintain healthy lifestyle",
                "Schedule routine checkup",
            ]
        };
        items.iter().map(|s| s.to_string()).collect()
    }

    fn create(&self, principal: &Claims, body: &Value) -> Result<DispatchResult> {
        let payload = body
            .as_object()
            .ok_or_else(|| AppError::Internal("assessment payload must be an object".into()))?;

        let empty = Map::new();
        let severity = payload
            .get("severity")
            .and_then(|v| v.as_object())
            .unwrap_or(&empty);

        let risk_score = Self::risk_score(severity);
        let severity_level = Self::severity_level(risk_score);
        let recommendations = Self::recommendations(risk_score);

        // Sensitive fields are encrypted before the record is stored; an
        // encryption failure aborts the whole create (fail-closed).
        let mut encrypted_fields = HashMap::new();
        let mut export_view = Map::new();
        for (key, value) in payload {
            if SENSITIVE_FIELDS.contains(&key.as_str()) {
                let ciphertext = self
                    .privacy
                    .encrypt(value.to_string().as_bytes(), ClassificationLevel::Restricted)?;
                encrypted_fields.insert(key.clone(), ciphertext);
            } else {
                export_view.insert(key.clone(), value.clone());
            }
        }

        let assessment = StoredAssessment {
            id: Uuid::new_v4().simple().to_string(),
            principal_id: principal.sub.clone(),
            risk_score,
            severity_level,
            recommendations,
            encrypted_fields,
            export_view: Value::Object(export_view),
            created_at: Utc::now(),
        };

        debug!(
            assessment_id = %assessment.id,
            risk_score,
            severity_level,
            "assessment created"
        );

        let response = json!({
            "assessment_id": assessment.id,
            "risk_score": assessment.risk_score,
            "recommendations": assessment.recommendations,
            "severity_level": assessment.severity_level,
            "timestamp": assessment.created_at.to_rfc3339(),
            "encrypted": true,
        });
        self.assessments.write().push(assessment);

        Ok(DispatchResult {
            action: "create_assessment".to_string(),
            resource_class: Some("assessment_data".to_string()),
            body: response,
        })
    }

    fn history(&self, principal: &Claims) -> DispatchResult {
        let assessments = self.assessments.read();
        let items: Vec<Value> = assessments
            .iter()
            .filter(|a| a.principal_id == principal.sub)
            .map(|a| {
                json!({
                    "assessment_id": a.id,
                    "risk_score": a.risk_score,
                    "severity_level": a.severity_level,
                    "timestamp": a.created_at.to_rfc3339(),
                })
            })
            .collect();

        DispatchResult {
            action: "view_assessment_history".to_string(),
            resource_class: Some("assessment_data".to_string()),
            body: json!({"total": items.len(), "assessments": items}),
        }
    }

    fn get(&self, request: &GatewayRequest) -> Result<DispatchResult> {
        let id = request
            .last_segment()
            .ok_or_else(|| AppError::NotFound("assessment id missing".into()))?;

        let assessments = self.assessments.read();
        let assessment = assessments
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::NotFound(format!("assessment not found: {}", id)))?;

        // The caller passed the permission check; sensitive fields come
        // back decrypted for the clinical view.
        let mut decrypted = Map::new();
        for (key, ciphertext) in &assessment.encrypted_fields {
            let plaintext = self.privacy.decrypt(ciphertext)?;
            let value: Value = serde_json::from_slice(&plaintext)?;
            decrypted.insert(key.clone(), value);
        }

        Ok(DispatchResult {
            action: "view_assessment".to_string(),
            resource_class: Some("assessment_data".to_string()),
            body: json!({
                "assessment_id": assessment.id,
                "risk_score": assessment.risk_score,
                "severity_level": assessment.severity_level,
                "recommendations": assessment.recommendations,
                "timestamp": assessment.created_at.to_rfc3339(),
                "details": Value::Object(decrypted),
            }),
        })
    }

    /// Anonymized dataset for analytics export
    fn export(&self) -> DispatchResult {
        let assessments = self.assessments.read();
        let records: Vec<Value> = assessments
            .iter()
            .map(|a| {
                let mut record = a.export_view.clone();
                if let Value::Object(map) = &mut record {
                    map.insert("risk_score".to_string(), json!(a.risk_score));
                    map.insert("severity_level".to_string(), json!(a.severity_level));
                }
                self.privacy.anonymize_record(&record)
            })
            .collect();

        DispatchResult {
            action: "create_analytics_dataset".to_string(),
            resource_class: Some("analytics_data".to_string()),
            body: json!({"total": records.len(), "records": records}),
        }
    }
}

#[async_trait]
impl Dispatcher for RiskAssessmentService {
    async fn dispatch<'a>(
        &self,
        principal: Option<&'a Claims>,
        request: &GatewayRequest,
        route: &GatewayRoute,
    ) -> Result<DispatchResult> {
        let principal =
            principal.ok_or_else(|| AppError::Internal("dispatch without principal".into()))?;

        match route.name {
            "create_assessment" => {
                let body = request
                    .body
                    .as_ref()
                    .ok_or_else(|| AppError::Internal("dispatch without payload".into()))?;
                self.create(principal, body)
            }
            "assessment_history" => Ok(self.history(principal)),
            "get_assessment" => self.get(request),
            "export_analytics" => Ok(self.export()),
            other => Err(AppError::Internal(format!("unroutable dispatch: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            sub: "p-1".into(),
            username: "doctor".into(),
            role: "doctor".into(),
            permissions: vec!["write:assessments".into()],
            iat: 0,
            exp: usize::MAX,
            kind: crate::security::auth::TokenKind::Access,
            jti: "t".into(),
        }
    }

    fn service() -> RiskAssessmentService {
        RiskAssessmentService::new(Arc::new(PrivacyEngine::development()))
    }

    #[test]
    fn test_risk_score_bands() {
        let high: Map<String, Value> = serde_json::from_value(
            json!({"chest_pain": 9, "breathing": 8})
        ).unwrap();
        let score = RiskAssessmentService::risk_score(&high);
        assert_eq!(score, 75.0); // capped
        assert_eq!(RiskAssessmentService::severity_level(score), "high");

        let mild: Map<String, Value> =
            serde_json::from_value(json!({"headache": 2})).unwrap();
        let score = RiskAssessmentService::risk_score(&mild);
        assert_eq!(score, 20.0);
        assert_eq!(RiskAssessmentService::severity_level(score), "low");

        assert_eq!(RiskAssessmentService::risk_score(&Map::new()), 0.0);
    }

    #[test]
    fn test_create_encrypts_sensitive_fields() {
        let service = service();
        let body = json!({
            "symptoms": ["fever", "cough"],
            "severity": {"fever": 5},
            "age": 37,
        });

        let result = service.create(&claims(), &body).unwrap();
        assert_eq!(result.body["encrypted"], true);
        assert_eq!(result.body["severity_level"], "medium");

        let stored = service.assessments.read();
        let ciphertext = stored[0].encrypted_fields.get("symptoms").unwrap();
        assert!(!ciphertext.contains("fever"));
        // Export view never carries the sensitive fields
        assert!(stored[0].export_view.get("symptoms").is_none());
        assert_eq!(stored[0].export_view["age"], 37);
    }

    #[test]
    fn test_get_decrypts_details() {
        let service = service();
        let body = json!({"symptoms": ["fever"], "severity": {"fever": 3}});
        let created = service.create(&claims(), &body).unwrap();
        let id = created.body["assessment_id"].as_str().unwrap().to_string();

        let request = GatewayRequest {
            method: "GET".into(),
            path: format!("/api/v1/assessments/{}", id),
            bearer: None,
            user_agent: String::new(),
            client_identifier: "x".into(),
            body: None,
        };

        let fetched = service.get(&request).unwrap();
        assert_eq!(fetched.body["details"]["symptoms"], json!(["fever"]));
    }

    #[test]
    fn test_history_is_scoped_to_principal() {
        let service = service();
        service
            .create(&claims(), &json!({"severity": {"a": 1}}))
            .unwrap();

        let mut other = claims();
        other.sub = "p-2".into();
        service
            .create(&other, &json!({"severity": {"b": 2}}))
            .unwrap();

        let mine = service.history(&claims());
        assert_eq!(mine.body["total"], 1);
    }

    #[test]
    fn test_export_anonymizes_records() {
        let service = service();
        service
            .create(
                &claims(),
                &json!({
                    "name": "Jane Doe",
                    "age": 37,
                    "location": "Austin, TX",
                    "severity": {"fever": 4},
                    "symptoms": ["fever"],
                }),
            )
            .unwrap();

        let export = service.export();
        let record = &export.body["records"][0];

        assert_ne!(record["name"], "Jane Doe");
        assert_eq!(record["age_range"], "30-44");
        assert_eq!(record["region"], "Southeast");
        assert!(record.get("age").is_none());
        assert!(record.get("symptoms").is_none());
        assert!(record.get("anonymization_id").is_some());
    }

    #[test]
    fn test_unknown_assessment_not_found() {
        let service = service();
        let request = GatewayRequest {
            method: "GET".into(),
            path: "/api/v1/assessments/missing".into(),
            bearer: None,
            user_agent: String::new(),
            client_identifier: "x".into(),
            body: None,
        };
        assert!(matches!(
            service.get(&request),
            Err(AppError::NotFound(_))
        ));
    }
}
