// ============================================================================
// Vault Infrastructure - PostgreSQL Migration Store
// File: crates/vault-infrastructure/src/database/postgres/migration_store_impl.rs
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Executor;
use tracing::{debug, error, info};

use vault_core::domain::Migration;
use vault_core::error::DomainError;
use vault_core::repositories::MigrationStore;

use crate::database::connection::PoolRegistry;
use crate::database::error::{map_db_error, public_cause};
use crate::database::migrations::MIGRATION_HISTORY_DDL;

/// Advisory lock key shared by every process migrating the same module database.
const MIGRATION_LOCK_KEY: i64 = 0x7661_756c_745f_6d67;

/// Per-module history table, reached through the module's own pool.
pub struct PgMigrationStore {
    registry: Arc<PoolRegistry>,
}

impl PgMigrationStore {
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    async fn ensure_history(&self, module: &str) -> Result<(), DomainError> {
        let pool = self.registry.get(module).await?;
        sqlx::raw_sql(MIGRATION_HISTORY_DDL)
            .execute(&pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!(module, "Failed to create migration history: {}", e);
                map_db_error(e)
            })?;
        Ok(())
    }

    async fn applied(&self, module: &str) -> Result<Vec<String>, DomainError> {
        let pool = self.registry.get(module).await?;
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM migration_history ORDER BY id")
            .fetch_all(&pool)
            .await
            .map_err(map_db_error)?;
        Ok(ids)
    }

    async fn apply(&self, module: &str, migration: &Migration) -> Result<(), DomainError> {
        let pool = self.registry.get(module).await?;
        let mut tx = pool.begin().await.map_err(map_db_error)?;

        // Held until commit/rollback, so concurrent runners queue up per database.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        let already: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM migration_history WHERE id = $1)")
                .bind(migration.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_db_error)?;
        if already {
            debug!(module, migration = migration.id, "Applied by a concurrent runner");
            return Ok(());
        }

        (&mut *tx)
            .execute(sqlx::raw_sql(migration.sql))
            .await
            .map_err(|e: sqlx::Error| {
                error!(module, migration = migration.id, "Migration failed: {}", e);
                DomainError::MigrationError {
                    module: module.to_string(),
                    migration: migration.id.to_string(),
                    message: public_cause(&e),
                }
            })?;

        sqlx::query("INSERT INTO migration_history (id, description) VALUES ($1, $2)")
            .bind(migration.id)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        info!(module, migration = migration.id, "Migration applied");
        Ok(())
    }
}
