//! # Vault Core
//! 
//! Domain entities, services, repository traits and gateway traits for the tenant isolation and
//! backup orchestration layer.

pub mod domain;
pub mod services;
pub mod repositories;
pub mod gateways;
pub mod error;

#[cfg(test)]
pub(crate) mod testing;

// Re-export domain entities
pub use domain::*;
pub use error::DomainError;
