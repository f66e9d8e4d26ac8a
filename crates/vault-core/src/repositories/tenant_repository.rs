//! Tenant repository trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ProvisioningPlan, Tenant, TenantStats};
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DomainError>;
    /// Case-insensitive lookup.
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, DomainError>;
    /// Active tenants, newest first.
    async fn list_active(&self) -> Result<Vec<Tenant>, DomainError>;
    /// Insert the catalog row and run the plan in one transaction. Nothing is left behind when
    /// any statement fails.
    async fn provision(&self, tenant: &Tenant, plan: &ProvisioningPlan) -> Result<Tenant, DomainError>;
    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError>;
    async fn touch_activity(&self, id: &Uuid, at: DateTime<Utc>) -> Result<(), DomainError>;
    /// Counts read directly from the tenant's isolated tables.
    async fn live_stats(&self, tenant: &Tenant) -> Result<TenantStats, DomainError>;
}
