//! Services Module
//!
//! Business logic behind the gateway's dispatch boundary. The gateway
//! treats everything here as an opaque collaborator.

pub mod assessment;

pub use assessment::{RiskAssessmentService, create_assessment_service};
