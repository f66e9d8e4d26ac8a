// ============================================================================
// Vault Core - Tenant Registry
// File: crates/vault-core/src/services/registry.rs
// ============================================================================
//! Catalog reads, usage accounting and tenant lifecycle

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{ResourceLimits, Tenant, TenantStatsReport, TenantUsage, UsageDelta};
use crate::error::DomainError;
use crate::repositories::{TenantRepository, UsageRepository};

/// Tenants are looked up either by id or by (case-insensitive) name.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantLookup {
    Id(Uuid),
    Name(String),
}

impl TenantLookup {
    /// Interpret a path segment: a UUID is an id, anything else a name.
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => TenantLookup::Id(id),
            Err(_) => TenantLookup::Name(raw.to_string()),
        }
    }
}

pub struct TenantRegistry {
    tenants: Arc<dyn TenantRepository>,
    usage: Arc<dyn UsageRepository>,
}

impl TenantRegistry {
    pub fn new(tenants: Arc<dyn TenantRepository>, usage: Arc<dyn UsageRepository>) -> Self {
        Self { tenants, usage }
    }

    pub async fn get_tenant(&self, lookup: &TenantLookup) -> Result<Option<Tenant>, DomainError> {
        match lookup {
            TenantLookup::Id(id) => self.tenants.find_by_id(id).await,
            TenantLookup::Name(name) => self.tenants.find_by_name(name).await,
        }
    }

    /// Like `get_tenant` by id, but a missing tenant is an error.
    pub async fn require_tenant(&self, id: &Uuid) -> Result<Tenant, DomainError> {
        self.tenants
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::TenantNotFound(id.to_string()))
    }

    /// Active tenants, newest first.
    pub async fn list_active_tenants(&self) -> Result<Vec<Tenant>, DomainError> {
        self.tenants.list_active().await
    }

    /// Fold a usage delta into today's row.
    ///
    /// `api_calls` and `bandwidth_mb` add up; `storage_used_mb` and `active_users` keep the
    /// day's maximum.
    #[instrument(skip(self, delta), fields(tenant_id = %tenant_id))]
    pub async fn record_usage(
        &self,
        tenant_id: &Uuid,
        delta: &UsageDelta,
    ) -> Result<TenantUsage, DomainError> {
        delta.validate()?;

        let tenant = self.require_tenant(tenant_id).await?;
        if !tenant.active {
            return Err(DomainError::TenantNotActive(tenant.id));
        }

        let now = Utc::now();
        let row = self.usage.record(&tenant.id, now.date_naive(), delta).await?;
        self.tenants.touch_activity(&tenant.id, now).await?;

        debug!(
            api_calls = row.api_calls,
            storage_used_mb = row.storage_used_mb,
            "Usage recorded"
        );
        Ok(row)
    }

    /// Fold a sampled gauge reading into today's row without counting it as tenant activity.
    pub async fn record_sample(
        &self,
        tenant: &Tenant,
        delta: &UsageDelta,
    ) -> Result<TenantUsage, DomainError> {
        delta.validate()?;
        self.usage
            .record(&tenant.id, Utc::now().date_naive(), delta)
            .await
    }

    /// Tenant, live stats of its isolated tables, and today's usage row.
    pub async fn get_tenant_stats(&self, tenant_id: &Uuid) -> Result<TenantStatsReport, DomainError> {
        let tenant = self.require_tenant(tenant_id).await?;
        let stats = self.tenants.live_stats(&tenant).await?;
        let usage_today = self.usage.find(&tenant.id, Utc::now().date_naive()).await?;

        Ok(TenantStatsReport {
            tenant,
            stats,
            usage_today,
        })
    }

    pub async fn update_limits(
        &self,
        tenant_id: &Uuid,
        limits: ResourceLimits,
    ) -> Result<Tenant, DomainError> {
        limits.validate()?;

        let mut tenant = self.require_tenant(tenant_id).await?;
        tenant.resource_limits = limits;
        let updated = self.tenants.update(&tenant).await?;

        info!(tenant_id = %updated.id, ?limits, "Tenant limits updated");
        Ok(updated)
    }

    /// Flip `active` off. Rows and schema stay in place.
    pub async fn deactivate_tenant(&self, tenant_id: &Uuid) -> Result<Tenant, DomainError> {
        let mut tenant = self.require_tenant(tenant_id).await?;
        if !tenant.active {
            return Ok(tenant);
        }

        tenant.deactivate();
        let updated = self.tenants.update(&tenant).await?;

        info!(tenant_id = %updated.id, "Tenant deactivated");
        Ok(updated)
    }
}
