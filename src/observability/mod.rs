//! Observability Module
//!
//! Health check and Prometheus-format metrics. Counters are plain atomics
//! shared with the gateway; no metrics backend dependency.

use axum::{Json, Router, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Gateway counters
#[derive(Debug, Clone, Default)]
pub struct AppMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub threats_blocked_total: Arc<AtomicU64>,
    pub rate_limited_total: Arc<AtomicU64>,
    pub auth_failures_total: Arc<AtomicU64>,
    pub permission_denials_total: Arc<AtomicU64>,
    pub validation_failures_total: Arc<AtomicU64>,
    pub dispatches_total: Arc<AtomicU64>,
    pub audit_entries_total: Arc<AtomicU64>,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_threat_blocked(&self) {
        self.threats_blocked_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_auth_failure(&self) {
        self.auth_failures_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_permission_denial(&self) {
        self.permission_denials_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_validation_failure(&self) {
        self.validation_failures_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_dispatch(&self) {
        self.dispatches_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_audit_entry(&self) {
        self.audit_entries_total.fetch_add(1, Ordering::SeqCst);
    }

    /// Render counters in Prometheus exposition format
    pub fn gather(&self) -> String {
        format!(
            r#"# HELP gateway_requests_total Requests entering the pipeline
# TYPE gateway_requests_total counter
gateway_requests_total {}
# HELP gateway_threats_blocked_total Requests blocked by threat scan
# TYPE gateway_threats_blocked_total counter
gateway_threats_blocked_total {}
# HELP gateway_rate_limited_total Requests denied by rate limiting
# TYPE gateway_rate_limited_total counter
gateway_rate_limited_total {}
# HELP gateway_auth_failures_total Credential verification failures
# TYPE gateway_auth_failures_total counter
gateway_auth_failures_total {}
# HELP gateway_permission_denials_total Permission check denials
# TYPE gateway_permission_denials_total counter
gateway_permission_denials_total {}
# HELP gateway_validation_failures_total Structural validation failures
# TYPE gateway_validation_failures_total counter
gateway_validation_failures_total {}
# HELP gateway_dispatches_total Requests handed to the business service
# TYPE gateway_dispatches_total counter
gateway_dispatches_total {}
# HELP gateway_audit_entries_total Audit ledger entries written
# TYPE gateway_audit_entries_total counter
gateway_audit_entries_total {}
"#,
            self.requests_total.load(Ordering::SeqCst),
            self.threats_blocked_total.load(Ordering::SeqCst),
            self.rate_limited_total.load(Ordering::SeqCst),
            self.auth_failures_total.load(Ordering::SeqCst),
            self.permission_denials_total.load(Ordering::SeqCst),
            self.validation_failures_total.load(Ordering::SeqCst),
            self.dispatches_total.load(Ordering::SeqCst),
            self.audit_entries_total.load(Ordering::SeqCst),
        )
    }
}

/// Health check payload
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
}

/// Shared observability state
pub struct ObservabilityState {
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub metrics: AppMetrics,
}

impl ObservabilityState {
    pub fn new(version: String, metrics: AppMetrics) -> Self {
        Self {
            version,
            started_at: Utc::now(),
            metrics,
        }
    }
}

async fn health(state: Arc<ObservabilityState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "healthy",
        version: state.version.clone(),
        started_at: state.started_at,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
    })
}

async fn metrics(state: Arc<ObservabilityState>) -> impl IntoResponse {
    state.metrics.gather()
}

/// Router exposing `/health` and `/metrics` (unauthenticated)
pub fn create_observability_router(state: Arc<ObservabilityState>) -> Router {
    let health_state = state.clone();
    Router::new()
        .route("/health", get(move || health(health_state.clone())))
        .route("/metrics", get(move || metrics(state.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = AppMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_threat_blocked();

        let text = metrics.gather();
        assert!(text.contains("gateway_requests_total 2"));
        assert!(text.contains("gateway_threats_blocked_total 1"));
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = AppMetrics::new();
        let clone = metrics.clone();
        clone.record_dispatch();
        assert!(metrics.gather().contains("gateway_dispatches_total 1"));
    }
}
