//! Administration DTOs
//!
//! The monitor/ledger types already serialize; these are the query
//! parameter shapes for the admin read endpoints.

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct SummaryParams {
    /// Trailing window, defaults to 24 hours
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct EventsParams {
    /// Maximum events returned, defaults to 100
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TrailParams {
    /// Trailing window in days, defaults to 30
    pub days: Option<i64>,
    /// Restrict to one principal
    pub principal_id: Option<String>,
}
