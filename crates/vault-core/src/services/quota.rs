//! Quota enforcement against live tenant stats

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::LimitCheck;
use crate::error::DomainError;
use crate::repositories::{TenantRepository, UsageRepository};

pub struct QuotaEnforcer {
    tenants: Arc<dyn TenantRepository>,
    usage: Arc<dyn UsageRepository>,
}

impl QuotaEnforcer {
    pub fn new(tenants: Arc<dyn TenantRepository>, usage: Arc<dyn UsageRepository>) -> Self {
        Self { tenants, usage }
    }

    /// Compare live row counts plus today's usage row with the tenant's limits.
    pub async fn check_limits(&self, tenant_id: &Uuid) -> Result<LimitCheck, DomainError> {
        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| DomainError::TenantNotFound(tenant_id.to_string()))?;

        let stats = self.tenants.live_stats(&tenant).await?;
        let today = self.usage.find(&tenant.id, Utc::now().date_naive()).await?;

        let check = LimitCheck::evaluate(&tenant, &stats, today.as_ref());
        if check.within_limits {
            info!(tenant_id = %tenant.id, "Tenant within limits");
        } else {
            warn!(tenant_id = %tenant.id, exceeded = ?check.exceeded, "Tenant over limits");
        }
        Ok(check)
    }
}
