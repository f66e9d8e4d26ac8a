//! Backup catalog repository trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{BackupConfig, BackupFile, BackupJob};
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait BackupRepository: Send + Sync {
    async fn create_config(&self, config: &BackupConfig) -> Result<BackupConfig, DomainError>;
    async fn find_config(&self, id: &Uuid) -> Result<Option<BackupConfig>, DomainError>;
    async fn list_configs(&self, active_only: bool) -> Result<Vec<BackupConfig>, DomainError>;
    /// Persists `active` and `retention_days` only.
    async fn update_config(&self, config: &BackupConfig) -> Result<BackupConfig, DomainError>;

    /// Insert a `running` job. Fails with `BackupAlreadyRunning` when the config already has one,
    /// atomically with the insert.
    async fn start_job(&self, job: &BackupJob) -> Result<BackupJob, DomainError>;
    /// Mark a running job completed and write its files in one transaction.
    async fn complete_job(&self, job: &BackupJob, files: &[BackupFile]) -> Result<(), DomainError>;
    /// Mark a running job failed.
    async fn fail_job(&self, job: &BackupJob) -> Result<(), DomainError>;

    async fn find_job(&self, id: &Uuid) -> Result<Option<BackupJob>, DomainError>;
    /// Newest first.
    async fn list_jobs(&self, limit: i64, offset: i64) -> Result<Vec<BackupJob>, DomainError>;
    async fn list_files(&self, job_id: &Uuid) -> Result<Vec<BackupFile>, DomainError>;
    /// Most recently completed job of a config.
    async fn last_completed_job(&self, config_id: &Uuid) -> Result<Option<BackupJob>, DomainError>;
    /// Oldest retained completed job of a config that captured a full backup.
    async fn oldest_full_job(&self, config_id: &Uuid) -> Result<Option<BackupJob>, DomainError>;
    async fn latest_job_for_module(&self, module: &str) -> Result<Option<BackupJob>, DomainError>;

    /// Delete completed jobs of a config finished before `cutoff`, skipping leased ones.
    /// Files cascade. Returns the number of deleted jobs.
    async fn delete_expired_jobs(
        &self,
        config_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DomainError>;

    /// Take the restore lease on a completed job; `RestoreNotAllowed` if it is not completed or
    /// already leased.
    async fn acquire_restore_lease(
        &self,
        job_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<BackupJob, DomainError>;
    async fn release_restore_lease(&self, job_id: &Uuid) -> Result<(), DomainError>;

    /// Startup recovery: fail every `running` job with `message` and drop every restore lease.
    /// Returns the number of jobs failed.
    async fn fail_interrupted_jobs(&self, message: &str, at: DateTime<Utc>) -> Result<u64, DomainError>;
}
