//! # Vault Core - Domain Module
//! 
//! Domain entities for tenant isolation and backup orchestration.

pub mod identifier;
pub mod tenant;
pub mod usage;
pub mod backup;
pub mod schedule;
pub mod migration;
pub mod module;

// Re-export all entities and enums
pub use tenant::{IsolationLevel, NewTenant, ProvisioningPlan, ResourceLimits, Tenant};
pub use usage::{LimitCheck, TenantStats, TenantStatsReport, TenantUsage, UsageDelta, UsageSnapshot};
pub use backup::{
    aggregate_checksum, job_location, Artifact, ArtifactKind, ArtifactRequest, BackupConfig,
    BackupDetails, BackupFile, BackupJob, BackupType, CompressionPolicy, FileType, JobStatus,
    JobSummary, NewBackupConfig,
};
pub use schedule::BackupSchedule;
pub use migration::{Migration, MigrationResult, MigrationStatus, ModuleMigrationReport};
pub use module::{ModuleInitialization, ModuleStatus, PoolStats};
