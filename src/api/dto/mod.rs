//! Request/Response DTOs

pub mod admin_dto;
pub mod assessment_dto;
pub mod auth_dto;

use crate::error::FieldViolation;

/// Flatten `validator` errors into the wire violation shape
pub fn violations_from(errors: validator::ValidationErrors) -> Vec<FieldViolation> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                FieldViolation::new(field.to_string(), message)
            })
        })
        .collect()
}
