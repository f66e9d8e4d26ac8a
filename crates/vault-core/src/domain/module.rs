//! Logical database modules

use serde::{Deserialize, Serialize};

use super::backup::BackupJob;
use super::migration::ModuleMigrationReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub name: String,
    pub connected: bool,
    pub pool: Option<PoolStats>,
    pub applied_migrations: Vec<String>,
    pub pending_migrations: Vec<String>,
    /// Most recent job whose config covers this module, failed ones included.
    pub last_backup_job: Option<BackupJob>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInitialization {
    pub module: String,
    pub pool: PoolStats,
    pub migrations: ModuleMigrationReport,
}
