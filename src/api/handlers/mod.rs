//! API Handlers

pub mod admin_handler;
pub mod assessment_handler;
pub mod auth_handler;
