//! Periodic collection of live usage gauges

use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::TenantRegistry;
use crate::domain::UsageDelta;
use crate::error::DomainError;
use crate::repositories::TenantRepository;

/// Samples each active tenant's schema and records `active_users` and `storage_used_mb`
/// through the registry, so the day's maximum is kept. Sampling leaves `last_activity` alone.
pub struct UsageCollector {
    tenants: Arc<dyn TenantRepository>,
    registry: Arc<TenantRegistry>,
}

impl UsageCollector {
    pub fn new(tenants: Arc<dyn TenantRepository>, registry: Arc<TenantRegistry>) -> Self {
        Self { tenants, registry }
    }

    /// One pass over the active tenants. Returns how many were sampled.
    pub async fn collect_once(&self) -> Result<usize, DomainError> {
        let tenants = self.tenants.list_active().await?;
        let mut sampled = 0;

        for tenant in &tenants {
            let stats = match self.tenants.live_stats(tenant).await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(tenant_id = %tenant.id, "Could not sample tenant: {}", e);
                    continue;
                }
            };

            let delta = UsageDelta {
                active_users: stats.active_users,
                storage_used_mb: stats.storage_mb,
                ..Default::default()
            };
            match self.registry.record_sample(tenant, &delta).await {
                Ok(_) => sampled += 1,
                Err(e) => warn!(tenant_id = %tenant.id, "Could not record sampled usage: {}", e),
            }
        }

        debug!(sampled, total = tenants.len(), "Usage collection pass finished");
        Ok(sampled)
    }
}
