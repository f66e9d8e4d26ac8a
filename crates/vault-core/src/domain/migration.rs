//! Named, ordered DDL units and their outcomes

use serde::{Deserialize, Serialize};

/// One idempotent DDL unit. Ids sort in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub id: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Applied,
    AlreadyApplied,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub module: String,
    pub migration_id: String,
    pub status: MigrationStatus,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl MigrationResult {
    pub fn is_new(&self) -> bool {
        self.status == MigrationStatus::Applied
    }
}

/// Outcome of running the catalog against one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMigrationReport {
    pub module: String,
    pub results: Vec<MigrationResult>,
    pub error: Option<String>,
}

impl ModuleMigrationReport {
    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_new()).count()
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.results.iter().all(|r| r.status != MigrationStatus::Failed)
    }
}
