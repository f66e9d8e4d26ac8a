// ============================================================================
// Vault Core - Schema Provisioner
// File: crates/vault-core/src/services/provisioning.rs
// ============================================================================
//! Creates a tenant together with its isolated schema in one atomic unit

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::notifications::OperatorNotifier;
use crate::domain::{NewTenant, ProvisioningPlan, Tenant};
use crate::error::DomainError;
use crate::repositories::TenantRepository;

pub struct TenantProvisioner {
    tenants: Arc<dyn TenantRepository>,
    /// The fixed module set a tenant may be assigned to.
    modules: Vec<String>,
    notifications: OperatorNotifier,
    /// One lock per normalized tenant name, held across the uniqueness check and the commit.
    name_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TenantProvisioner {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        modules: Vec<String>,
        notifications: OperatorNotifier,
    ) -> Self {
        Self {
            tenants,
            modules,
            notifications,
            name_locks: DashMap::new(),
        }
    }

    /// Create a tenant catalog row plus schema, tables and RLS policies.
    ///
    /// Nothing becomes visible unless every step commits. A second caller racing on the same
    /// name waits for the first and then fails with `DuplicateTenantName`.
    #[instrument(skip(self, request), fields(tenant_name = %request.name, module = %request.module))]
    pub async fn create_tenant(&self, request: NewTenant) -> Result<Tenant, DomainError> {
        let key = Tenant::normalized_name(&request.name);
        let lock = self.name_locks.entry(key.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock().await;
            self.provision_locked(request).await
        };

        drop(lock);
        self.name_locks.remove_if(&key, |_, l| Arc::strong_count(l) == 1);

        let tenant = result?;
        self.notifications
            .notify(&format!(
                "Tenant '{}' provisioned in schema {}",
                tenant.name, tenant.schema_prefix
            ))
            .await;
        Ok(tenant)
    }

    async fn provision_locked(&self, request: NewTenant) -> Result<Tenant, DomainError> {
        // 1. Module must belong to the fixed set; uniqueness checked before any DDL runs
        let module = request.module.trim();
        if !self.modules.iter().any(|m| m == module) {
            warn!("Unknown module for tenant {}: {}", request.name, module);
            return Err(DomainError::ModuleNotFound(module.to_string()));
        }
        if self.tenants.find_by_name(&request.name).await?.is_some() {
            warn!("Tenant name already taken: {}", request.name);
            return Err(DomainError::DuplicateTenantName(request.name.trim().to_string()));
        }

        // 2. Catalog entry with a sanitized, collision-resistant schema prefix
        let tenant = Tenant::new(request)?;

        // 3. Ordered DDL, executed by the repository inside the catalog transaction
        let plan = ProvisioningPlan::for_tenant(&tenant)
            .map_err(|e| DomainError::SchemaCreationError(e.to_string()))?;

        let created = self.tenants.provision(&tenant, &plan).await.map_err(|e| {
            warn!(tenant_id = %tenant.id, "Provisioning rolled back: {}", e);
            e
        })?;

        info!(
            tenant_id = %created.id,
            schema = %created.schema_prefix,
            "Tenant provisioned"
        );
        Ok(created)
    }
}
