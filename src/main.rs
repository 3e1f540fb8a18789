use medgate::api::{self, app_state::AppState};
use medgate::config::config::LoggingConfig;
use medgate::config::loader::ConfigLoader;
use medgate::gateway::RequestGateway;
use medgate::models::principal_repository::PrincipalRepository;
use medgate::observability::{AppMetrics, ObservabilityState, create_observability_router};
use medgate::privacy::{Anonymizer, AuditLedger, ClassificationTable, EncryptionService, PrivacyEngine};
use medgate::security::auth::{AuthService, TokenService};
use medgate::security::rate_limit::{RateLimitRule, RateLimiter};
use medgate::security::rbac::PermissionRegistry;
use medgate::security::store::{InMemoryKvStore, RedisKvStore, SharedKvStore};
use medgate::security::threat::ThreatMonitor;
use medgate::services::create_assessment_service;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load()?;
    ConfigLoader::validate(&config)?;
    init_tracing(&config.logging);
    info!(environment = %config.environment, "starting {}", config.app_name);

    // Read-mostly components, constructed once and shared
    let registry = Arc::new(PermissionRegistry::default());
    let tokens = Arc::new(TokenService::new(
        &config.security.jwt_secret,
        config.security.access_token_ttl_seconds,
        config.security.refresh_token_ttl_seconds,
        registry,
    ));

    let principals = Arc::new(if config.is_production() {
        PrincipalRepository::new()
    } else {
        PrincipalRepository::development()
    });
    info!(count = principals.count(), "principal store initialized");

    let auth_service = Arc::new(AuthService::new(tokens.clone(), principals.clone()));

    let store: Arc<dyn SharedKvStore> = match &config.security.redis_url {
        Some(url) => {
            info!(url = %url, "using redis for shared rate/block state");
            Arc::new(RedisKvStore::connect(url).await?)
        }
        None => Arc::new(InMemoryKvStore::new()),
    };

    let rate_limiter = Arc::new(RateLimiter::new(
        RateLimitRule {
            requests_per_minute: config.security.rate_limit.requests_per_minute,
            requests_per_hour: config.security.rate_limit.requests_per_hour,
            requests_per_day: config.security.rate_limit.requests_per_day,
        },
        store,
        config.security.rate_limit.enabled,
    ));
    info!(enabled = config.security.rate_limit.enabled, "rate limiter initialized");

    let threat = Arc::new(ThreatMonitor::new());
    info!("threat monitor initialized");

    let encryption = Arc::new(EncryptionService::load_or_generate(
        &config.security.encryption_key_file,
    )?);
    let privacy = Arc::new(PrivacyEngine::new(
        encryption,
        Anonymizer::new(&config.security.anonymization_secret),
        AuditLedger::new(ClassificationTable::default()),
    ));
    info!("privacy engine initialized");

    let dispatcher = create_assessment_service(privacy.clone());
    let metrics = AppMetrics::new();

    let gateway = Arc::new(RequestGateway::new(
        tokens,
        rate_limiter,
        threat,
        privacy,
        Arc::from(dispatcher),
        metrics.clone(),
    ));
    info!("request gateway assembled");

    let app_state = AppState::new(gateway, auth_service, principals);

    let observability_state = Arc::new(ObservabilityState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        metrics,
    ));
    let router =
        create_observability_router(observability_state).merge(api::create_router(app_state));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.structured {
        builder.json().init();
    } else {
        builder.init();
    }
}
