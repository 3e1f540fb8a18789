//! API Routes

pub mod admin_routes;
pub mod assessment_routes;
pub mod auth_routes;
