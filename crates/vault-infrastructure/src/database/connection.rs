// ============================================================================
// Vault Infrastructure - Connection Pool Registry
// File: crates/vault-infrastructure/src/database/connection.rs
// ============================================================================
//! One lazily created PostgreSQL pool per logical module

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use vault_core::domain::PoolStats;
use vault_core::error::DomainError;
use vault_core::repositories::ModuleConnector;
use vault_shared::config::DatabaseSettings;
use vault_shared::utils::mask_url_password;

use super::error::map_db_error;

/// Build a pool for one module database. Every connection gets the configured
/// `statement_timeout`, and acquisition is bounded by `acquire_timeout_secs`.
pub async fn create_pool(url: &str, settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(url)?
        .application_name("tenant-vault")
        .options([(
            "statement_timeout",
            format!("{}s", settings.statement_timeout_secs),
        )]);

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect_with(options)
        .await
}

/// Pool-per-module cache owned by the application root.
pub struct PoolRegistry {
    settings: DatabaseSettings,
    /// One cell per module: concurrent first callers of a module share one connect attempt,
    /// and a module that is down never blocks the others.
    pools: DashMap<String, Arc<OnceCell<PgPool>>>,
}

impl PoolRegistry {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            pools: DashMap::new(),
        }
    }

    fn open_pool(&self, module: &str) -> Option<PgPool> {
        self.pools
            .get(module)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn catalog_module(&self) -> &str {
        &self.settings.catalog_module
    }

    /// Pool for `module`, connecting on first use.
    pub async fn get(&self, module: &str) -> Result<PgPool, DomainError> {
        if let Some(pool) = self.open_pool(module) {
            return Ok(pool);
        }
        if !self.settings.is_known_module(module) {
            return Err(DomainError::ModuleNotFound(module.to_string()));
        }

        // Clone the cell out so no map shard stays locked across the connect.
        let cell = self.pools.entry(module.to_string()).or_default().clone();
        // A failed attempt leaves the cell empty, so the next caller retries.
        cell.get_or_try_init(|| self.connect_with_retry(module))
            .await
            .cloned()
    }

    pub async fn catalog(&self) -> Result<PgPool, DomainError> {
        self.get(&self.settings.catalog_module).await
    }

    async fn connect_with_retry(&self, module: &str) -> Result<PgPool, DomainError> {
        let url = self.settings.url_for(module);
        let attempts = self.settings.connect_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            info!(
                module,
                attempt,
                url = %mask_url_password(&url),
                "Connecting module database"
            );
            match create_pool(&url, &self.settings).await {
                Ok(pool) => {
                    info!(module, "Module pool ready");
                    return Ok(pool);
                }
                Err(e) => {
                    let mapped = map_db_error(e);
                    warn!(module, attempt, "Module connection failed: {}", mapped);
                    if !mapped.is_retryable() {
                        return Err(mapped);
                    }
                    last_error = Some(mapped);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| DomainError::ConnectionError(format!("could not connect {}", module))))
    }

    /// Close every pool; used on shutdown.
    pub async fn close_all(&self) {
        let pools: Vec<(String, PgPool)> = self
            .pools
            .iter()
            .filter_map(|entry| entry.value().get().map(|pool| (entry.key().clone(), pool.clone())))
            .collect();
        for (module, pool) in pools {
            pool.close().await;
            info!(module = %module, "Module pool closed");
        }
        self.pools.clear();
    }
}

#[async_trait]
impl ModuleConnector for PoolRegistry {
    fn modules(&self) -> Vec<String> {
        self.settings.modules.clone()
    }

    async fn connect(&self, module: &str) -> Result<PoolStats, DomainError> {
        self.get(module).await?;
        self.pool_stats(module)
            .ok_or_else(|| DomainError::ConnectionError(format!("pool for {} vanished", module)))
    }

    fn pool_stats(&self, module: &str) -> Option<PoolStats> {
        self.open_pool(module).map(|pool| PoolStats {
            size: pool.size(),
            idle: pool.num_idle() as u32,
        })
    }

    async fn ping(&self, module: &str) -> Result<(), DomainError> {
        let pool = self.get(module).await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }
}
