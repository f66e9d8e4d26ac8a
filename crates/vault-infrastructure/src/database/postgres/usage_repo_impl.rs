// ============================================================================
// Vault Infrastructure - PostgreSQL Usage Repository
// File: crates/vault-infrastructure/src/database/postgres/usage_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use vault_core::domain::{TenantUsage, UsageDelta};
use vault_core::error::DomainError;
use vault_core::repositories::UsageRepository;

use crate::database::error::map_db_error;

/// Single upsert: counters add, gauges keep the daily maximum.
const UPSERT_USAGE_SQL: &str = r#"
    INSERT INTO tenant_usage (
        tenant_id, usage_date, api_calls, storage_used_mb,
        active_users, bandwidth_mb, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, NOW())
    ON CONFLICT (tenant_id, usage_date) DO UPDATE SET
        api_calls = tenant_usage.api_calls + EXCLUDED.api_calls,
        bandwidth_mb = tenant_usage.bandwidth_mb + EXCLUDED.bandwidth_mb,
        storage_used_mb = GREATEST(tenant_usage.storage_used_mb, EXCLUDED.storage_used_mb),
        active_users = GREATEST(tenant_usage.active_users, EXCLUDED.active_users),
        updated_at = NOW()
    RETURNING
        tenant_id, usage_date, api_calls, storage_used_mb,
        active_users, bandwidth_mb, updated_at
"#;

pub struct PgUsageRepository {
    pool: PgPool,
}

impl PgUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UsageRow {
    tenant_id: Uuid,
    usage_date: NaiveDate,
    api_calls: i64,
    storage_used_mb: f64,
    active_users: i64,
    bandwidth_mb: f64,
    updated_at: DateTime<Utc>,
}

impl From<UsageRow> for TenantUsage {
    fn from(row: UsageRow) -> Self {
        TenantUsage {
            tenant_id: row.tenant_id,
            date: row.usage_date,
            api_calls: row.api_calls,
            storage_used_mb: row.storage_used_mb,
            active_users: row.active_users,
            bandwidth_mb: row.bandwidth_mb,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    async fn record(
        &self,
        tenant_id: &Uuid,
        date: NaiveDate,
        delta: &UsageDelta,
    ) -> Result<TenantUsage, DomainError> {
        let row: UsageRow = sqlx::query_as(UPSERT_USAGE_SQL)
            .bind(tenant_id)
            .bind(date)
            .bind(delta.api_calls)
            .bind(delta.storage_used_mb)
            .bind(delta.active_users)
            .bind(delta.bandwidth_mb)
            .fetch_one(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!(tenant_id = %tenant_id, "Database error recording usage: {}", e);
                map_db_error(e)
            })?;

        Ok(row.into())
    }

    async fn find(&self, tenant_id: &Uuid, date: NaiveDate) -> Result<Option<TenantUsage>, DomainError> {
        let row: Option<UsageRow> = sqlx::query_as(
            r#"
            SELECT
                tenant_id, usage_date, api_calls, storage_used_mb,
                active_users, bandwidth_mb, updated_at
            FROM tenant_usage
            WHERE tenant_id = $1 AND usage_date = $2
            "#,
        )
        .bind(tenant_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(row.map(|r| r.into()))
    }
}
