//! Domain Models

pub mod principal;
pub mod principal_repository;

pub use principal::{NewPrincipal, Principal};
pub use principal_repository::PrincipalRepository;
