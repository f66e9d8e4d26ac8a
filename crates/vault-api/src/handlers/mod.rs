//! HTTP handlers

pub mod backups;
pub mod health;
pub mod modules;
pub mod tenants;

use uuid::Uuid;

use crate::error::ApiError;

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid id: {}", raw)))
}
