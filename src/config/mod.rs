//! Configuration Module

pub mod config;
pub mod loader;

pub use config::{AppConfig, LoggingConfig, RateLimitSettings, SecuritySettings, ServerConfig};
pub use loader::{ConfigLoader, ConfigValidationError};
