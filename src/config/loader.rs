use crate::config::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default locations
    ///
    /// Merge order (later wins):
    /// 1. development defaults
    /// 2. ./config.toml
    /// 3. MEDGATE_* environment variables
    pub fn load() -> Result<AppConfig, figment::Error> {
        let figment = Figment::new()
            .merge(Serialized::defaults(AppConfig::development()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("MEDGATE_").split("_").global());

        figment.extract()
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: PathBuf) -> Result<AppConfig, figment::Error> {
        let figment = Figment::new()
            .merge(Serialized::defaults(AppConfig::development()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("MEDGATE_").split("_").global());

        figment.extract()
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.security.jwt_secret.len() < 32 {
            return Err(ConfigValidationError::WeakJwtSecret);
        }

        if config.security.access_token_ttl_seconds == 0
            || config.security.refresh_token_ttl_seconds == 0
        {
            return Err(ConfigValidationError::InvalidTokenTtl);
        }

        if config.is_production()
            && config.security.jwt_secret.contains("dev-secret")
        {
            return Err(ConfigValidationError::DevSecretInProduction);
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("server port must be greater than 0")]
    InvalidPort,

    #[error("jwt secret must be at least 32 characters")]
    WeakJwtSecret,

    #[error("token TTLs must be greater than 0")]
    InvalidTokenTtl,

    #[error("development jwt secret is not allowed in production")]
    DevSecretInProduction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_config_is_valid() {
        let config = AppConfig::development();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_weak_jwt_secret_rejected() {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "short".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::WeakJwtSecret)
        ));
    }

    #[test]
    fn test_dev_secret_rejected_in_production() {
        let mut config = AppConfig::development();
        config.environment = "production".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::DevSecretInProduction)
        ));
    }
}
