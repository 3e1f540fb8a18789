//! Request Gateway
//!
//! Per-request pipeline composing threat scanning, rate limiting,
//! authentication, permission checks, input validation, dispatch to the
//! business-logic collaborator, and audit logging into one allow/deny
//! decision:
//!
//! `RECEIVED -> THREAT_SCAN -> RATE_CHECK -> AUTH_CHECK -> PERMISSION_CHECK
//!  -> INPUT_VALIDATE -> DISPATCH -> AUDIT_LOG -> RESPONDED`
//!
//! Every stage can terminate the request with its own taxonomy error; the
//! checks are an explicit ordered chain rather than handler wrappers, so
//! each stage is unit-testable on its own. The gateway owns explicitly
//! constructed components and holds no request-scoped singleton state.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, FieldViolation, Result};
use crate::observability::AppMetrics;
use crate::privacy::PrivacyEngine;
use crate::security::auth::{Claims, TokenService};
use crate::security::middleware::{extract_bearer, extract_client_identifier, extract_user_agent};
use crate::security::rate_limit::{RateDecision, RateLimiter};
use crate::security::rbac::Permission;
use crate::security::threat::{ThreatCategory, ThreatEvent, ThreatLevel, ThreatMonitor, Violation};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    ThreatScan,
    RateCheck,
    AuthCheck,
    PermissionCheck,
    InputValidate,
    Dispatch,
    AuditLog,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::ThreatScan => "threat_scan",
            Stage::RateCheck => "rate_check",
            Stage::AuthCheck => "auth_check",
            Stage::PermissionCheck => "permission_check",
            Stage::InputValidate => "input_validate",
            Stage::Dispatch => "dispatch",
            Stage::AuditLog => "audit_log",
            Stage::Responded => "responded",
        };
        write!(f, "{}", s)
    }
}

/// Inbound request as the gateway sees it
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: String,
    pub path: String,
    /// Bearer credential, if the Authorization header carried one
    pub bearer: Option<String>,
    pub user_agent: String,
    /// Opaque rate-limit identifier (forwarded IP, API key, ...)
    pub client_identifier: String,
    pub body: Option<Value>,
}

impl GatewayRequest {
    /// Build from axum request parts
    pub fn from_parts(
        method: &str,
        path: &str,
        headers: &HeaderMap,
        body: Option<Value>,
    ) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            bearer: extract_bearer(headers),
            user_agent: extract_user_agent(headers),
            client_identifier: extract_client_identifier(headers),
            body,
        }
    }

    /// Trailing path segment (resource id on `/.../{id}` routes)
    pub fn last_segment(&self) -> Option<&str> {
        self.path.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

/// Structural validator applied at INPUT_VALIDATE on write routes
pub type RouteValidator = fn(&Value) -> std::result::Result<(), Vec<FieldViolation>>;

/// Static description of a gateway-protected route
#[derive(Debug, Clone, Copy)]
pub struct GatewayRoute {
    pub name: &'static str,
    /// AUTH_CHECK runs only on protected routes
    pub requires_auth: bool,
    pub required_permission: Option<Permission>,
    /// Classified routes always get an audit entry, success or failure
    pub resource_class: Option<&'static str>,
    /// Default audit action; the dispatch result may refine it
    pub action: &'static str,
    pub purpose: &'static str,
    /// Write operations run structural validation
    pub write: bool,
    pub validate: Option<RouteValidator>,
}

/// Opaque result from the business-logic collaborator. The gateway reads
/// only `action`/`resource_class`, for audit logging.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub action: String,
    pub resource_class: Option<String>,
    pub body: Value,
}

/// Business-logic collaborator contract. The gateway hands over the
/// decoded principal and the (validated, original) payload and treats the
/// result as opaque.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch<'a>(
        &self,
        principal: Option<&'a Claims>,
        request: &GatewayRequest,
        route: &GatewayRoute,
    ) -> Result<DispatchResult>;
}

/// Successful pipeline outcome
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub body: Value,
    /// Residual non-blocking scan violations
    pub warnings: Vec<Violation>,
    pub action: String,
    pub resource_class: Option<String>,
    pub principal_id: Option<String>,
}

/// The request gateway. Owns its components; constructed once at startup
/// and shared across request tasks.
pub struct RequestGateway {
    tokens: Arc<TokenService>,
    rate_limiter: Arc<RateLimiter>,
    threat: Arc<ThreatMonitor>,
    privacy: Arc<PrivacyEngine>,
    dispatcher: Arc<dyn Dispatcher>,
    metrics: AppMetrics,
}

impl RequestGateway {
    pub fn new(
        tokens: Arc<TokenService>,
        rate_limiter: Arc<RateLimiter>,
        threat: Arc<ThreatMonitor>,
        privacy: Arc<PrivacyEngine>,
        dispatcher: Arc<dyn Dispatcher>,
        metrics: AppMetrics,
    ) -> Self {
        Self {
            tokens,
            rate_limiter,
            threat,
            privacy,
            dispatcher,
            metrics,
        }
    }

    /// THREAT_SCAN + RATE_CHECK, shared by every route including the
    /// unprotected credential exchange. Returns residual non-blocking
    /// violations as warnings.
    pub async fn screen(&self, req: &GatewayRequest) -> Result<Vec<Violation>> {
        self.metrics.record_request();
        debug!(stage = %Stage::ThreatScan, path = %req.path, "pipeline stage");

        self.threat
            .analyze_user_agent(&req.client_identifier, &req.user_agent, &req.path);

        let mut warnings = Vec::new();
        if let Some(body) = &req.body {
            let report = self.threat.scan_payload(body);

            if report.has_blocking() {
                // Worst blocking violation names the denial
                let worst = report
                    .violations
                    .iter()
                    .filter(|v| v.severity.is_blocking())
                    .max_by_key(|v| v.severity)
                    .expect("blocking violation present");

                self.threat.record_event(ThreatEvent {
                    timestamp: Utc::now(),
                    category: worst.category,
                    severity: worst.severity,
                    source: req.client_identifier.clone(),
                    endpoint: req.path.clone(),
                    blocked: true,
                    detail: Some(format!("field {}", worst.field)),
                });
                self.metrics.record_threat_blocked();

                return Err(AppError::ThreatDetected {
                    category: worst.category.as_str().to_string(),
                    severity: worst.severity.to_string(),
                });
            }

            for violation in report.warnings() {
                self.threat.record_event(ThreatEvent {
                    timestamp: Utc::now(),
                    category: violation.category,
                    severity: violation.severity,
                    source: req.client_identifier.clone(),
                    endpoint: req.path.clone(),
                    blocked: false,
                    detail: Some(format!("field {}", violation.field)),
                });
            }
            warnings = report.warnings();
        }

        debug!(stage = %Stage::RateCheck, path = %req.path, "pipeline stage");
        match self.rate_limiter.check(&req.client_identifier).await? {
            RateDecision::Allowed { .. } => {}
            RateDecision::Denied {
                reason,
                retry_after,
            } => {
                self.threat.record_event(ThreatEvent {
                    timestamp: Utc::now(),
                    category: ThreatCategory::RateLimitExceeded,
                    severity: ThreatLevel::High,
                    source: req.client_identifier.clone(),
                    endpoint: req.path.clone(),
                    blocked: true,
                    detail: Some(reason.as_str().to_string()),
                });
                self.metrics.record_rate_limited();

                return Err(AppError::RateLimited {
                    reason: reason.as_str().to_string(),
                    retry_after,
                });
            }
        }

        Ok(warnings)
    }

    /// `screen` plus AUTH_CHECK and PERMISSION_CHECK. Used directly by
    /// read endpoints that serve monitor state instead of dispatching.
    pub async fn authorize(
        &self,
        req: &GatewayRequest,
        route: &GatewayRoute,
    ) -> Result<(Option<Claims>, Vec<Violation>)> {
        let warnings = self.screen(req).await?;

        if !route.requires_auth {
            return Ok((None, warnings));
        }

        debug!(stage = %Stage::AuthCheck, route = route.name, "pipeline stage");
        let token = req.bearer.as_deref().ok_or(AppError::MalformedCredential);
        let claims = match token.and_then(|t| self.tokens.verify_access(t)) {
            Ok(claims) => claims,
            Err(e) => {
                self.metrics.record_auth_failure();
                self.threat.record_event(ThreatEvent {
                    timestamp: Utc::now(),
                    category: ThreatCategory::UnauthorizedAccess,
                    severity: ThreatLevel::Medium,
                    source: req.client_identifier.clone(),
                    endpoint: req.path.clone(),
                    blocked: true,
                    detail: None,
                });
                return Err(e);
            }
        };

        // PERMISSION_CHECK runs against the credential's snapshot, not the
        // live registry: an unexpired credential keeps the permissions it
        // was issued with.
        if let Some(required) = route.required_permission {
            debug!(stage = %Stage::PermissionCheck, route = route.name, "pipeline stage");
            if !claims.has_permission(required.as_str()) {
                self.metrics.record_permission_denial();
                return Err(AppError::InsufficientPermission {
                    required: required.as_str().to_string(),
                });
            }
        }

        Ok((Some(claims), warnings))
    }

    /// Full pipeline for business routes. The audit entry is written for
    /// every classified-resource access, success or failure, before the
    /// response is returned; an audit append failure fails the request.
    pub async fn handle(
        &self,
        req: &GatewayRequest,
        route: &GatewayRoute,
    ) -> Result<GatewayResponse> {
        debug!(stage = %Stage::Received, route = route.name, method = %req.method, "pipeline stage");
        let outcome = self.run_stages(req, route).await;

        if let Some(class) = route.resource_class {
            debug!(stage = %Stage::AuditLog, route = route.name, "pipeline stage");
            let (principal_id, action, class, success) = match &outcome {
                Ok(resp) => (
                    resp.principal_id.clone().unwrap_or_else(|| "anonymous".to_string()),
                    resp.action.clone(),
                    resp.resource_class.clone().unwrap_or_else(|| class.to_string()),
                    true,
                ),
                Err(_) => (
                    "anonymous".to_string(),
                    route.action.to_string(),
                    class.to_string(),
                    false,
                ),
            };

            self.privacy
                .log_access(&principal_id, &action, &class, route.purpose, success)
                .map_err(|_| AppError::AuditWriteFailure)?;
            self.metrics.record_audit_entry();
        }

        debug!(stage = %Stage::Responded, route = route.name, ok = outcome.is_ok(), "pipeline stage");
        outcome
    }

    async fn run_stages(
        &self,
        req: &GatewayRequest,
        route: &GatewayRoute,
    ) -> Result<GatewayResponse> {
        let (claims, warnings) = self.authorize(req, route).await?;

        if route.write {
            debug!(stage = %Stage::InputValidate, route = route.name, "pipeline stage");
            if let Some(validate) = route.validate {
                let body = req.body.as_ref().ok_or_else(|| AppError::ValidationFailed {
                    violations: vec![FieldViolation::new("body", "request body required")],
                })?;

                if let Err(violations) = validate(body) {
                    self.metrics.record_validation_failure();
                    return Err(AppError::ValidationFailed { violations });
                }
            }
        }

        debug!(stage = %Stage::Dispatch, route = route.name, "pipeline stage");
        let result = self
            .dispatcher
            .dispatch(claims.as_ref(), req, route)
            .await?;
        self.metrics.record_dispatch();

        let mut body = result.body;
        if !warnings.is_empty() {
            if let Value::Object(map) = &mut body {
                map.insert("warnings".to_string(), json!(warnings));
            }
        }

        Ok(GatewayResponse {
            body,
            warnings,
            action: result.action,
            resource_class: result.resource_class,
            principal_id: claims.map(|c| c.sub),
        })
    }

    pub fn privacy(&self) -> &PrivacyEngine {
        &self.privacy
    }

    pub fn threat(&self) -> &ThreatMonitor {
        &self.threat
    }

    pub fn metrics(&self) -> &AppMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::principal_repository::PrincipalRepository;
    use crate::security::auth::AuthService;
    use crate::security::rate_limit::{RateLimitRule, RateLimiter};
    use crate::security::store::InMemoryKvStore;
    use serde_json::json;

    const ASSESS_ROUTE: GatewayRoute = GatewayRoute {
        name: "create_assessment",
        requires_auth: true,
        required_permission: Some(Permission::WriteAssessments),
        resource_class: Some("assessment_data"),
        action: "create_assessment",
        purpose: "health_assessment",
        write: true,
        validate: None,
    };

    fn request(bearer: Option<String>, body: Option<Value>) -> GatewayRequest {
        GatewayRequest {
            method: "POST".into(),
            path: "/api/v1/assessments".into(),
            bearer,
            user_agent: "medgate-tests/1.0".into(),
            client_identifier: "203.0.113.50".into(),
            body,
        }
    }

    struct Fixture {
        gateway: RequestGateway,
        auth: AuthService,
    }

    fn fixture(dispatcher: MockDispatcher) -> Fixture {
        let tokens = Arc::new(TokenService::development());
        let principals = Arc::new(PrincipalRepository::development());
        let auth = AuthService::new(tokens.clone(), principals);

        let gateway = RequestGateway::new(
            tokens,
            Arc::new(RateLimiter::new(
                RateLimitRule::default(),
                Arc::new(InMemoryKvStore::new()),
                true,
            )),
            Arc::new(ThreatMonitor::new()),
            Arc::new(PrivacyEngine::development()),
            Arc::new(dispatcher),
            AppMetrics::new(),
        );

        Fixture { gateway, auth }
    }

    fn dispatcher_returning(body: Value) -> MockDispatcher {
        let mut mock = MockDispatcher::new();
        mock.expect_dispatch()
            .returning(move |_, _, route| {
                Ok(DispatchResult {
                    action: route.action.to_string(),
                    resource_class: route.resource_class.map(|c| c.to_string()),
                    body: body.clone(),
                })
            });
        mock
    }

    #[tokio::test]
    async fn test_success_path_dispatches_and_audits() {
        let f = fixture(dispatcher_returning(json!({"assessment_id": "a-1"})));
        let bundle = f.auth.login("doctor", "doctor123", None).unwrap();

        let req = request(
            Some(bundle.pair.access_token),
            Some(json!({"symptoms": ["fever"]})),
        );
        let response = f.gateway.handle(&req, &ASSESS_ROUTE).await.unwrap();

        assert_eq!(response.body["assessment_id"], "a-1");
        assert_eq!(response.principal_id.as_deref(), Some(bundle.principal.id.as_str()));

        let trail = f.gateway.privacy().audit_trail(&Default::default());
        assert_eq!(trail.len(), 1);
        assert!(trail[0].success);
        assert_eq!(trail[0].resource_class, "assessment_data");
    }

    #[tokio::test]
    async fn test_threat_scan_short_circuits_before_dispatch() {
        let mut mock = MockDispatcher::new();
        mock.expect_dispatch().times(0);
        let f = fixture(mock);
        let bundle = f.auth.login("doctor", "doctor123", None).unwrap();

        let req = request(
            Some(bundle.pair.access_token),
            Some(json!({"comment": "'; DROP TABLE users; --"})),
        );
        let err = f.gateway.handle(&req, &ASSESS_ROUTE).await.unwrap_err();

        assert!(matches!(err, AppError::ThreatDetected { .. }));
        // Blocked event recorded, audit entry records the failed access
        assert!(f.gateway.threat().event_count() >= 1);
        let trail = f.gateway.privacy().audit_trail(&Default::default());
        assert_eq!(trail.len(), 1);
        assert!(!trail[0].success);
    }

    #[tokio::test]
    async fn test_missing_credential_terminates_at_auth() {
        let mut mock = MockDispatcher::new();
        mock.expect_dispatch().times(0);
        let f = fixture(mock);

        let req = request(None, Some(json!({"symptoms": []})));
        let err = f.gateway.handle(&req, &ASSESS_ROUTE).await.unwrap_err();

        assert!(matches!(err, AppError::MalformedCredential));
    }

    #[tokio::test]
    async fn test_viewer_lacks_write_permission() {
        let mut mock = MockDispatcher::new();
        mock.expect_dispatch().times(0);
        let f = fixture(mock);
        let bundle = f.auth.login("viewer", "viewer123", None).unwrap();

        let req = request(Some(bundle.pair.access_token), Some(json!({"x": 1})));
        let err = f.gateway.handle(&req, &ASSESS_ROUTE).await.unwrap_err();

        match err {
            AppError::InsufficientPermission { required } => {
                assert_eq!(required, "write:assessments");
            }
            other => panic!("expected permission denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_structural_validation_blocks_dispatch() {
        fn require_symptoms(body: &Value) -> std::result::Result<(), Vec<FieldViolation>> {
            if body.get("symptoms").and_then(|v| v.as_array()).is_none() {
                return Err(vec![FieldViolation::new("symptoms", "must be an array")]);
            }
            Ok(())
        }

        let mut route = ASSESS_ROUTE;
        route.validate = Some(require_symptoms);

        let mut mock = MockDispatcher::new();
        mock.expect_dispatch().times(0);
        let f = fixture(mock);
        let bundle = f.auth.login("doctor", "doctor123", None).unwrap();

        let req = request(Some(bundle.pair.access_token), Some(json!({"symptoms": 3})));
        let err = f.gateway.handle(&req, &route).await.unwrap_err();

        match err {
            AppError::ValidationFailed { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "symptoms");
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_residual_violations_ride_as_warnings() {
        let f = fixture(dispatcher_returning(json!({"ok": true})));
        let bundle = f.auth.login("doctor", "doctor123", None).unwrap();

        // Path traversal is medium severity: logged, attached, not blocking
        let req = request(
            Some(bundle.pair.access_token),
            Some(json!({"file": "x/../../etc/passwd"})),
        );
        let response = f.gateway.handle(&req, &ASSESS_ROUTE).await.unwrap();

        assert_eq!(response.warnings.len(), 1);
        assert!(response.body.get("warnings").is_some());
    }

    #[tokio::test]
    async fn test_rate_denial_before_auth() {
        let tokens = Arc::new(TokenService::development());
        let mut mock = MockDispatcher::new();
        mock.expect_dispatch().times(0);

        let gateway = RequestGateway::new(
            tokens,
            Arc::new(RateLimiter::new(
                RateLimitRule {
                    requests_per_minute: 1,
                    requests_per_hour: 10,
                    requests_per_day: 10,
                },
                Arc::new(InMemoryKvStore::new()),
                true,
            )),
            Arc::new(ThreatMonitor::new()),
            Arc::new(PrivacyEngine::development()),
            Arc::new(mock),
            AppMetrics::new(),
        );

        let req = request(None, None);
        assert!(gateway.screen(&req).await.is_ok());

        let err = gateway.screen(&req).await.unwrap_err();
        match err {
            AppError::RateLimited { reason, retry_after } => {
                assert_eq!(reason, "rate_limit_minute");
                assert_eq!(retry_after, 60);
            }
            other => panic!("expected rate denial, got {:?}", other),
        }
    }

    #[test]
    fn test_last_segment() {
        let req = GatewayRequest {
            method: "GET".into(),
            path: "/api/v1/assessments/a-42".into(),
            bearer: None,
            user_agent: String::new(),
            client_identifier: "x".into(),
            body: None,
        };
        assert_eq!(req.last_segment(), Some("a-42"));
    }
}
