use std::sync::Arc;

use crate::gateway::RequestGateway;
use crate::models::principal_repository::PrincipalRepository;
use crate::security::auth::AuthService;

/// Application state shared across request handlers
#[derive(Clone)]
pub struct AppState {
    /// Request gateway owning the security/privacy components
    pub gateway: Arc<RequestGateway>,
    /// Credential exchange (login/refresh)
    pub auth_service: Arc<AuthService>,
    /// Principal store
    pub principals: Arc<PrincipalRepository>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gateway", &"Arc<RequestGateway>")
            .field("auth_service", &"Arc<AuthService>")
            .field("principals", &self.principals)
            .finish()
    }
}

impl AppState {
    pub fn new(
        gateway: Arc<RequestGateway>,
        auth_service: Arc<AuthService>,
        principals: Arc<PrincipalRepository>,
    ) -> Self {
        Self {
            gateway,
            auth_service,
            principals,
        }
    }

    /// Development state: in-memory stores, seeded accounts, default
    /// policy, ephemeral encryption key.
    pub fn development() -> Self {
        use crate::observability::AppMetrics;
        use crate::privacy::PrivacyEngine;
        use crate::security::auth::TokenService;
        use crate::security::rate_limit::{RateLimitRule, RateLimiter};
        use crate::security::store::InMemoryKvStore;
        use crate::security::threat::ThreatMonitor;
        use crate::services::create_assessment_service;

        let tokens = Arc::new(TokenService::development());
        let principals = Arc::new(PrincipalRepository::development());
        let auth_service = Arc::new(AuthService::new(tokens.clone(), principals.clone()));

        let privacy = Arc::new(PrivacyEngine::development());
        let gateway = Arc::new(RequestGateway::new(
            tokens,
            Arc::new(RateLimiter::new(
                RateLimitRule::default(),
                Arc::new(InMemoryKvStore::new()),
                true,
            )),
            Arc::new(ThreatMonitor::new()),
            privacy.clone(),
            Arc::from(create_assessment_service(privacy)),
            AppMetrics::new(),
        ));

        Self::new(gateway, auth_service, principals)
    }
}
