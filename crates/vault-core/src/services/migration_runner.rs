// ============================================================================
// Vault Core - Migration Runner
// File: crates/vault-core/src/services/migration_runner.rs
// ============================================================================
//! Applies the core migration catalog per module, tracked in `migration_history`

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{error, info, instrument};

use crate::domain::{Migration, MigrationResult, MigrationStatus, ModuleMigrationReport};
use crate::error::DomainError;
use crate::repositories::MigrationStore;

pub struct MigrationRunner {
    store: Arc<dyn MigrationStore>,
    catalog: Vec<Migration>,
}

impl MigrationRunner {
    pub fn new(store: Arc<dyn MigrationStore>, mut catalog: Vec<Migration>) -> Self {
        catalog.sort_by_key(|m| m.id);
        Self { store, catalog }
    }

    pub fn catalog_ids(&self) -> Vec<String> {
        self.catalog.iter().map(|m| m.id.to_string()).collect()
    }

    /// Apply every catalog entry not yet recorded for `module`, in id order.
    ///
    /// A failing migration is reported as `Failed` and stops the remaining ones for this
    /// module; it is not returned as an error.
    #[instrument(skip(self))]
    pub async fn apply_all_core_migrations(
        &self,
        module: &str,
    ) -> Result<Vec<MigrationResult>, DomainError> {
        self.store.ensure_history(module).await?;
        let applied = self.store.applied(module).await?;

        let mut results = Vec::with_capacity(self.catalog.len());
        for migration in &self.catalog {
            if applied.iter().any(|id| id == migration.id) {
                results.push(result(module, migration, MigrationStatus::AlreadyApplied, None, 0));
                continue;
            }

            let started = Instant::now();
            let outcome = self.store.apply(module, migration).await;
            let elapsed = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(()) => {
                    info!(migration = migration.id, elapsed_ms = elapsed, "Migration applied");
                    results.push(result(module, migration, MigrationStatus::Applied, None, elapsed));
                }
                Err(e) => {
                    let failure = DomainError::MigrationError {
                        module: module.to_string(),
                        migration: migration.id.to_string(),
                        message: e.to_string(),
                    };
                    error!("{}", failure);
                    results.push(result(
                        module,
                        migration,
                        MigrationStatus::Failed,
                        Some(e.to_string()),
                        elapsed,
                    ));
                    break;
                }
            }
        }

        Ok(results)
    }

    /// Catalog ids not yet recorded for `module`.
    pub async fn pending(&self, module: &str) -> Result<Vec<String>, DomainError> {
        let applied = self.store.applied(module).await?;
        Ok(self
            .catalog
            .iter()
            .filter(|m| !applied.iter().any(|id| id == m.id))
            .map(|m| m.id.to_string())
            .collect())
    }

    pub async fn applied(&self, module: &str) -> Result<Vec<String>, DomainError> {
        self.store.applied(module).await
    }

    /// Run one module and fold any error into the report.
    pub async fn migrate_module(&self, module: &str) -> ModuleMigrationReport {
        match self.apply_all_core_migrations(module).await {
            Ok(results) => ModuleMigrationReport {
                module: module.to_string(),
                results,
                error: None,
            },
            Err(e) => {
                error!(module, "Migrations could not start: {}", e);
                ModuleMigrationReport {
                    module: module.to_string(),
                    results: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Migrate every module in parallel. One module failing never affects the others.
    pub async fn apply_across_modules(&self, modules: &[String]) -> Vec<ModuleMigrationReport> {
        join_all(modules.iter().map(|module| self.migrate_module(module))).await
    }
}

fn result(
    module: &str,
    migration: &Migration,
    status: MigrationStatus,
    error: Option<String>,
    duration_ms: u64,
) -> MigrationResult {
    MigrationResult {
        module: module.to_string(),
        migration_id: migration.id.to_string(),
        status,
        error,
        duration_ms,
    }
}
