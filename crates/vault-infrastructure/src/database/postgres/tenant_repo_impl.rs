// ============================================================================
// Vault Infrastructure - PostgreSQL Tenant Repository
// File: crates/vault-infrastructure/src/database/postgres/tenant_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, PgPool};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use vault_core::domain::identifier::qualified;
use vault_core::domain::{
    IsolationLevel, ProvisioningPlan, ResourceLimits, Tenant, TenantStats,
};
use vault_core::error::DomainError;
use vault_core::repositories::TenantRepository;
use vault_shared::utils::bytes_to_mb;

use crate::database::error::{map_db_error, public_cause, unique_violation};
use crate::database::migrations::{TENANT_NAME_UNIQUE, TENANT_PREFIX_UNIQUE};

pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct TenantRow {
    pub id: Uuid,
    pub name: String,
    pub module: String,
    pub schema_prefix: String,
    pub isolation_level: String,
    pub max_users: i64,
    pub max_storage_mb: i64,
    pub max_api_calls_per_day: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            name: row.name,
            module: row.module,
            schema_prefix: row.schema_prefix,
            isolation_level: IsolationLevel::from_str(&row.isolation_level).unwrap_or_default(),
            resource_limits: ResourceLimits {
                max_users: row.max_users,
                max_storage_mb: row.max_storage_mb,
                max_api_calls_per_day: row.max_api_calls_per_day,
            },
            active: row.active,
            created_at: row.created_at,
            last_activity: row.last_activity,
        }
    }
}

#[derive(Debug, FromRow)]
struct StatsRow {
    total_users: i64,
    active_sessions: i64,
    active_users: i64,
    data_rows: i64,
    storage_bytes: i64,
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DomainError> {
        let row: Option<TenantRow> = sqlx::query_as(
            r#"
            SELECT
                id, name, module, schema_prefix, isolation_level,
                max_users, max_storage_mb, max_api_calls_per_day,
                active, created_at, last_activity
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error finding tenant by id: {}", e);
            map_db_error(e)
        })?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, DomainError> {
        let row: Option<TenantRow> = sqlx::query_as(
            r#"
            SELECT
                id, name, module, schema_prefix, isolation_level,
                max_users, max_storage_mb, max_api_calls_per_day,
                active, created_at, last_activity
            FROM tenants
            WHERE LOWER(name) = LOWER(TRIM($1))
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error finding tenant by name: {}", e);
            map_db_error(e)
        })?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, DomainError> {
        let rows: Vec<TenantRow> = sqlx::query_as(
            r#"
            SELECT
                id, name, module, schema_prefix, isolation_level,
                max_users, max_storage_mb, max_api_calls_per_day,
                active, created_at, last_activity
            FROM tenants
            WHERE active = TRUE
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error listing active tenants: {}", e);
            map_db_error(e)
        })?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    #[instrument(skip(self, tenant, plan), fields(tenant_id = %tenant.id, schema = %plan.schema))]
    async fn provision(&self, tenant: &Tenant, plan: &ProvisioningPlan) -> Result<Tenant, DomainError> {
        // Dropping the transaction on any early return rolls everything back.
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let row: TenantRow = sqlx::query_as(
            r#"
            INSERT INTO tenants (
                id, name, module, schema_prefix, isolation_level,
                max_users, max_storage_mb, max_api_calls_per_day,
                active, created_at, last_activity
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING
                id, name, module, schema_prefix, isolation_level,
                max_users, max_storage_mb, max_api_calls_per_day,
                active, created_at, last_activity
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.module)
        .bind(&tenant.schema_prefix)
        .bind(tenant.isolation_level.as_str())
        .bind(tenant.resource_limits.max_users)
        .bind(tenant.resource_limits.max_storage_mb)
        .bind(tenant.resource_limits.max_api_calls_per_day)
        .bind(tenant.active)
        .bind(tenant.created_at)
        .bind(tenant.last_activity)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e: sqlx::Error| match unique_violation(&e).as_deref() {
            Some(TENANT_NAME_UNIQUE) => {
                warn!("Tenant name taken by a concurrent writer: {}", tenant.name);
                DomainError::DuplicateTenantName(tenant.name.clone())
            }
            Some(TENANT_PREFIX_UNIQUE) => DomainError::SchemaCreationError(format!(
                "schema prefix {} already registered",
                tenant.schema_prefix
            )),
            _ => map_db_error(e),
        })?;

        for (index, statement) in plan.statements.iter().enumerate() {
            (&mut *tx)
                .execute(sqlx::raw_sql(statement))
                .await
                .map_err(|e: sqlx::Error| {
                    error!(step = index, "Provisioning DDL failed: {}", e);
                    DomainError::SchemaCreationError(format!("step {}: {}", index, public_cause(&e)))
                })?;
        }

        tx.commit().await.map_err(|e| {
            error!("Provisioning commit failed: {}", e);
            DomainError::SchemaCreationError(format!("commit: {}", public_cause(&e)))
        })?;

        info!("Tenant catalog row and schema committed");
        Ok(row.into())
    }

    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        let row: Option<TenantRow> = sqlx::query_as(
            r#"
            UPDATE tenants
            SET max_users = $2,
                max_storage_mb = $3,
                max_api_calls_per_day = $4,
                active = $5,
                last_activity = $6
            WHERE id = $1
            RETURNING
                id, name, module, schema_prefix, isolation_level,
                max_users, max_storage_mb, max_api_calls_per_day,
                active, created_at, last_activity
            "#,
        )
        .bind(tenant.id)
        .bind(tenant.resource_limits.max_users)
        .bind(tenant.resource_limits.max_storage_mb)
        .bind(tenant.resource_limits.max_api_calls_per_day)
        .bind(tenant.active)
        .bind(tenant.last_activity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error updating tenant: {}", e);
            map_db_error(e)
        })?;

        row.map(|r| r.into())
            .ok_or_else(|| DomainError::TenantNotFound(tenant.id.to_string()))
    }

    async fn touch_activity(&self, id: &Uuid, at: DateTime<Utc>) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE tenants
            SET last_activity = GREATEST(COALESCE(last_activity, $2), $2)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn live_stats(&self, tenant: &Tenant) -> Result<TenantStats, DomainError> {
        let users = qualified(&tenant.schema_prefix, "users")?;
        let sessions = qualified(&tenant.schema_prefix, "sessions")?;
        let tenant_data = qualified(&tenant.schema_prefix, "tenant_data")?;

        let sql = format!(
            r#"
            SELECT
                (SELECT COUNT(*) FROM {users}) AS total_users,
                (SELECT COUNT(*) FROM {sessions}
                    WHERE revoked_at IS NULL AND expires_at > NOW()) AS active_sessions,
                (SELECT COUNT(DISTINCT user_id) FROM {sessions}
                    WHERE revoked_at IS NULL AND expires_at > NOW()) AS active_users,
                (SELECT COUNT(*) FROM {tenant_data}) AS data_rows,
                (SELECT COALESCE(SUM(pg_total_relation_size(c.oid)), 0)::BIGINT
                    FROM pg_class c
                    JOIN pg_namespace n ON n.oid = c.relnamespace
                    WHERE n.nspname = $1 AND c.relkind = 'r') AS storage_bytes
            "#,
            users = users,
            sessions = sessions,
            tenant_data = tenant_data
        );

        let row: StatsRow = sqlx::query_as(&sql)
            .bind(&tenant.schema_prefix)
            .fetch_one(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!(tenant_id = %tenant.id, "Database error reading tenant stats: {}", e);
                map_db_error(e)
            })?;

        Ok(TenantStats {
            total_users: row.total_users,
            active_sessions: row.active_sessions,
            active_users: row.active_users,
            data_rows: row.data_rows,
            storage_mb: bytes_to_mb(row.storage_bytes),
        })
    }
}
