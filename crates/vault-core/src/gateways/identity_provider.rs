//! Identity/access provider trait (port)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Tenant;
use crate::error::DomainError;

/// Credentials handed back by the identity provider for a new tenant realm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub realm: String,
    pub client_id: String,
    pub admin_username: String,
    pub admin_password: String,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_realm(&self, tenant: &Tenant) -> Result<AdminCredentials, DomainError>;
}
