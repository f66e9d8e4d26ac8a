//! Usage repository trait (port)

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{TenantUsage, UsageDelta};
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Upsert the `(tenant_id, date)` row following [`TenantUsage::apply`] semantics.
    async fn record(
        &self,
        tenant_id: &Uuid,
        date: NaiveDate,
        delta: &UsageDelta,
    ) -> Result<TenantUsage, DomainError>;

    async fn find(&self, tenant_id: &Uuid, date: NaiveDate) -> Result<Option<TenantUsage>, DomainError>;
}
