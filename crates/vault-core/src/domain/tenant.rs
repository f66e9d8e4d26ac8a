// ============================================================================
// Vault Core - Tenant Entity
// File: crates/vault-core/src/domain/tenant.rs
// Description: Tenant catalog entry, resource limits and the provisioning plan
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use vault_shared::constants::{
    DEFAULT_MAX_API_CALLS_PER_DAY, DEFAULT_MAX_STORAGE_MB, DEFAULT_MAX_USERS, TENANT_TABLES,
};

use super::identifier::{derive_schema_prefix, qualified, quote_ident};
use crate::error::DomainError;

/// How strongly a tenant is separated from its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    Schema,
    Database,
    RowLevel,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::Schema => "schema",
            IsolationLevel::Database => "database",
            IsolationLevel::RowLevel => "row_level",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "schema" => Some(IsolationLevel::Schema),
            "database" => Some(IsolationLevel::Database),
            "row_level" => Some(IsolationLevel::RowLevel),
            _ => None,
        }
    }
}

/// Per-tenant quotas. A limit is exceeded only when usage is strictly greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ResourceLimits {
    #[validate(range(min = 0, message = "max_users must not be negative"))]
    pub max_users: i64,

    #[validate(range(min = 0, message = "max_storage_mb must not be negative"))]
    pub max_storage_mb: i64,

    #[validate(range(min = 0, message = "max_api_calls_per_day must not be negative"))]
    pub max_api_calls_per_day: i64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_users: DEFAULT_MAX_USERS,
            max_storage_mb: DEFAULT_MAX_STORAGE_MB,
            max_api_calls_per_day: DEFAULT_MAX_API_CALLS_PER_DAY,
        }
    }
}

/// Request to provision a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTenant {
    #[validate(length(min = 2, max = 100, message = "Tenant name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 63, message = "Module name must be between 1 and 63 characters"))]
    pub module: String,

    #[serde(default)]
    #[validate(nested)]
    pub resource_limits: ResourceLimits,

    #[serde(default)]
    pub isolation_level: IsolationLevel,
}

/// Tenant catalog entry. Never hard-deleted; deactivation flips `active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub module: String,
    pub schema_prefix: String,
    pub isolation_level: IsolationLevel,
    pub resource_limits: ResourceLimits,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl Tenant {
    /// Build a catalog entry with a freshly derived, sanitized schema prefix.
    pub fn new(request: NewTenant) -> Result<Self, DomainError> {
        request.validate()?;

        let id = Uuid::new_v4();
        let name = request.name.trim().to_string();
        let schema_prefix = derive_schema_prefix(&name, &id)?;

        Ok(Self {
            id,
            name,
            module: request.module.trim().to_string(),
            schema_prefix,
            isolation_level: request.isolation_level,
            resource_limits: request.resource_limits,
            active: true,
            created_at: Utc::now(),
            last_activity: None,
        })
    }

    /// Lookup key used for the name uniqueness check.
    pub fn normalized_name(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub fn record_activity(&mut self) {
        self.last_activity = Some(Utc::now());
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.last_activity = Some(Utc::now());
    }
}

/// Ordered DDL that isolates one tenant. Executed inside the same transaction as the catalog
/// insert, so either all of it lands or none of it does.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningPlan {
    pub schema: String,
    pub statements: Vec<String>,
}

impl ProvisioningPlan {
    pub fn for_tenant(tenant: &Tenant) -> Result<Self, DomainError> {
        let schema = quote_ident(&tenant.schema_prefix)?;
        // A Uuid renders as hex and dashes only, so it is safe to inline where Postgres
        // does not accept bind parameters (column defaults, policy expressions).
        let tenant_literal = format!("'{}'::uuid", tenant.id);

        let users = qualified(&tenant.schema_prefix, "users")?;
        let sessions = qualified(&tenant.schema_prefix, "sessions")?;
        let tenant_data = qualified(&tenant.schema_prefix, "tenant_data")?;

        let mut statements = vec![
            format!("CREATE SCHEMA {}", schema),
            format!(
                "CREATE TABLE {users} (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    tenant_id UUID NOT NULL DEFAULT {tid},
                    email TEXT NOT NULL,
                    display_name TEXT,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (tenant_id, email)
                )",
                users = users,
                tid = tenant_literal
            ),
            format!(
                "CREATE TABLE {sessions} (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    tenant_id UUID NOT NULL DEFAULT {tid},
                    user_id UUID NOT NULL REFERENCES {users}(id) ON DELETE CASCADE,
                    token_hash TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    expires_at TIMESTAMPTZ NOT NULL,
                    revoked_at TIMESTAMPTZ
                )",
                sessions = sessions,
                users = users,
                tid = tenant_literal
            ),
            format!(
                "CREATE TABLE {tenant_data} (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    tenant_id UUID NOT NULL DEFAULT {tid},
                    key TEXT NOT NULL,
                    value JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (tenant_id, key)
                )",
                tenant_data = tenant_data,
                tid = tenant_literal
            ),
        ];

        for table in TENANT_TABLES {
            let target = qualified(&tenant.schema_prefix, table)?;
            statements.push(format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY", target));
            statements.push(format!("ALTER TABLE {} FORCE ROW LEVEL SECURITY", target));
            statements.push(format!(
                "CREATE POLICY {policy} ON {target} FOR ALL USING (tenant_id = {tid}) WITH CHECK (tenant_id = {tid})",
                policy = quote_ident(&format!("{}_tenant_isolation", table))?,
                target = target,
                tid = tenant_literal
            ));
            statements.push(format!(
                "CREATE INDEX {index} ON {target} (tenant_id)",
                index = quote_ident(&format!("idx_{}_tenant_id", table))?,
                target = target
            ));
        }

        Ok(Self {
            schema: tenant.schema_prefix.clone(),
            statements,
        })
    }
}
