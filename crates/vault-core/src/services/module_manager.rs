//! Module initialization and status

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::migration_runner::MigrationRunner;
use crate::domain::{ModuleInitialization, ModuleStatus};
use crate::error::DomainError;
use crate::repositories::{BackupRepository, ModuleConnector};

/// Result of initializing one module as part of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInitOutcome {
    pub module: String,
    pub initialization: Option<ModuleInitialization>,
    pub error: Option<String>,
}

pub struct ModuleManager {
    connector: Arc<dyn ModuleConnector>,
    runner: Arc<MigrationRunner>,
    backups: Arc<dyn BackupRepository>,
}

impl ModuleManager {
    pub fn new(
        connector: Arc<dyn ModuleConnector>,
        runner: Arc<MigrationRunner>,
        backups: Arc<dyn BackupRepository>,
    ) -> Self {
        Self {
            connector,
            runner,
            backups,
        }
    }

    pub fn modules(&self) -> Vec<String> {
        self.connector.modules()
    }

    fn ensure_known(&self, module: &str) -> Result<(), DomainError> {
        if self.connector.modules().iter().any(|m| m == module) {
            Ok(())
        } else {
            Err(DomainError::ModuleNotFound(module.to_string()))
        }
    }

    /// Open the module's pool and bring its schema up to date.
    pub async fn initialize_module(&self, module: &str) -> Result<ModuleInitialization, DomainError> {
        self.ensure_known(module)?;

        let pool = self.connector.connect(module).await?;
        let migrations = self.runner.migrate_module(module).await;

        info!(
            module,
            pool_size = pool.size,
            applied = migrations.applied_count(),
            succeeded = migrations.succeeded(),
            "Module initialized"
        );
        Ok(ModuleInitialization {
            module: module.to_string(),
            pool,
            migrations,
        })
    }

    /// Initialize the whole module set in parallel; failures stay with their module.
    pub async fn initialize_all_modules(&self) -> Vec<ModuleInitOutcome> {
        let modules = self.connector.modules();
        join_all(modules.iter().map(|module| async move {
            match self.initialize_module(module).await {
                Ok(initialization) => ModuleInitOutcome {
                    module: module.clone(),
                    initialization: Some(initialization),
                    error: None,
                },
                Err(e) => {
                    warn!(module = %module, "Module initialization failed: {}", e);
                    ModuleInitOutcome {
                        module: module.clone(),
                        initialization: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        }))
        .await
    }

    /// Connectivity, pool, migration and backup state of one module.
    pub async fn get_module_status(&self, module: &str) -> Result<ModuleStatus, DomainError> {
        self.ensure_known(module)?;

        let mut status = ModuleStatus {
            name: module.to_string(),
            connected: false,
            pool: None,
            applied_migrations: Vec::new(),
            pending_migrations: Vec::new(),
            last_backup_job: None,
            error: None,
        };

        match self.connector.ping(module).await {
            Ok(()) => {
                status.connected = true;
                match self.runner.applied(module).await {
                    Ok(applied) => {
                        status.pending_migrations = self
                            .runner
                            .catalog_ids()
                            .into_iter()
                            .filter(|id| !applied.contains(id))
                            .collect();
                        status.applied_migrations = applied;
                    }
                    Err(e) => status.error = Some(e.to_string()),
                }
            }
            Err(e) => status.error = Some(e.to_string()),
        }
        status.pool = self.connector.pool_stats(module);

        match self.backups.latest_job_for_module(module).await {
            Ok(job) => status.last_backup_job = job,
            Err(e) => {
                warn!(module, "Could not load last backup job: {}", e);
                status.error.get_or_insert_with(|| e.to_string());
            }
        }

        Ok(status)
    }
}
