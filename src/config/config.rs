use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Request timeout (seconds)
    pub request_timeout: u64,
    /// Maximum request body size (bytes)
    pub max_request_size: usize,
}

/// Rate limit thresholds, one per nested window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Maximum requests per minute
    pub requests_per_minute: u32,
    /// Maximum requests per hour
    pub requests_per_hour: u32,
    /// Maximum requests per day
    pub requests_per_day: u32,
    /// Enable rate limiting
    pub enabled: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1000,
            requests_per_day: 10000,
            enabled: true,
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecuritySettings {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Access token TTL (seconds)
    pub access_token_ttl_seconds: u64,
    /// Refresh token TTL (seconds)
    pub refresh_token_ttl_seconds: u64,
    /// Path of the master encryption key file
    pub encryption_key_file: PathBuf,
    /// Deployment secret keyed into pseudonym derivation
    pub anonymization_secret: String,
    /// Rate limit thresholds
    pub rate_limit: RateLimitSettings,
    /// Redis address for shared rate/block state (in-memory when unset)
    pub redis_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter
    pub level: String,
    /// Emit JSON-structured log lines
    pub structured: bool,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecuritySettings,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Application name
    pub app_name: String,
    /// Environment
    pub environment: String,
}

impl AppConfig {
    /// Development environment defaults
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8080,
                request_timeout: 30,
                max_request_size: 10 * 1024 * 1024,
            },
            security: SecuritySettings {
                jwt_secret: "dev-secret-change-in-production-min-32-chars".into(),
                access_token_ttl_seconds: 30 * 60,
                refresh_token_ttl_seconds: 7 * 24 * 3600,
                encryption_key_file: PathBuf::from(".encryption_key"),
                anonymization_secret: "dev-anonymization-secret".into(),
                rate_limit: RateLimitSettings::default(),
                redis_url: None,
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
            },
            app_name: "medgate".into(),
            environment: "development".into(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
