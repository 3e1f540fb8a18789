//! Medgate - Access-control and data-protection gateway
//!
//! Fronts a health-assessment service with token authentication, role
//! permissions, multi-window rate limiting, threat detection, and a
//! privacy engine (encryption, deterministic anonymization, compliance
//! audit/retention tracking).

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod observability;
pub mod privacy;
pub mod security;
pub mod services;
