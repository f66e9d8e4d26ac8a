// ============================================================================
// Vault Infrastructure - PostgreSQL Backup Repository
// File: crates/vault-infrastructure/src/database/postgres/backup_repo_impl.rs
// Description: Backup configs, job state machine rows and file manifests
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{error, info, warn};
use uuid::Uuid;

use vault_core::domain::{BackupConfig, BackupFile, BackupJob, BackupType, FileType, JobStatus};
use vault_core::error::DomainError;
use vault_core::repositories::BackupRepository;

use crate::database::error::{map_db_error, unique_violation};
use crate::database::migrations::ONE_RUNNING_JOB;

pub struct PgBackupRepository {
    pool: PgPool,
}

impl PgBackupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const JOB_COLUMNS: &str = "id, backup_config_id, status, started_at, completed_at, \
     total_size_mb, compressed_size_mb, files_count, checksum, backup_location, \
     error_message, restore_started_at, effective_type";

const CONFIG_COLUMNS: &str = "id, backup_type, modules, include_tenants, compression, \
     encryption, retention_days, schedule, active, created_at";

#[derive(Debug, FromRow)]
struct ConfigRow {
    id: Uuid,
    backup_type: String,
    modules: Vec<String>,
    include_tenants: bool,
    compression: bool,
    encryption: bool,
    retention_days: i32,
    schedule: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConfigRow> for BackupConfig {
    type Error = DomainError;

    fn try_from(row: ConfigRow) -> Result<Self, Self::Error> {
        let backup_type = BackupType::from_str(&row.backup_type).ok_or_else(|| {
            DomainError::DatabaseError(format!("unknown backup type {}", row.backup_type))
        })?;
        Ok(BackupConfig {
            id: row.id,
            backup_type,
            modules: row.modules,
            include_tenants: row.include_tenants,
            compression: row.compression,
            encryption: row.encryption,
            retention_days: row.retention_days,
            schedule: row.schedule,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    backup_config_id: Uuid,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    total_size_mb: f64,
    compressed_size_mb: f64,
    files_count: i32,
    checksum: Option<String>,
    backup_location: Option<String>,
    error_message: Option<String>,
    restore_started_at: Option<DateTime<Utc>>,
    effective_type: Option<String>,
}

impl TryFrom<JobRow> for BackupJob {
    type Error = DomainError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::DatabaseError(format!("unknown job status {}", row.status)))?;
        let effective_type = row
            .effective_type
            .map(|t| {
                BackupType::from_str(&t)
                    .ok_or_else(|| DomainError::DatabaseError(format!("unknown backup type {}", t)))
            })
            .transpose()?;
        Ok(BackupJob {
            id: row.id,
            backup_config_id: row.backup_config_id,
            status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            total_size_mb: row.total_size_mb,
            compressed_size_mb: row.compressed_size_mb,
            files_count: row.files_count,
            checksum: row.checksum,
            backup_location: row.backup_location,
            error_message: row.error_message,
            restore_started_at: row.restore_started_at,
            effective_type,
        })
    }
}

#[derive(Debug, FromRow)]
struct FileRow {
    job_id: Uuid,
    file_name: String,
    file_type: String,
    module_name: String,
    tenant_id: Option<Uuid>,
    size_mb: f64,
    checksum: String,
}

impl TryFrom<FileRow> for BackupFile {
    type Error = DomainError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let file_type = FileType::from_str(&row.file_type)
            .ok_or_else(|| DomainError::DatabaseError(format!("unknown file type {}", row.file_type)))?;
        Ok(BackupFile {
            job_id: row.job_id,
            file_name: row.file_name,
            file_type,
            module_name: row.module_name,
            tenant_id: row.tenant_id,
            size_mb: row.size_mb,
            checksum: row.checksum,
        })
    }
}

fn job_from(row: Option<JobRow>) -> Result<Option<BackupJob>, DomainError> {
    row.map(BackupJob::try_from).transpose()
}

impl PgBackupRepository {
    async fn fetch_job(&self, sql: &str, id: &Uuid) -> Result<Option<BackupJob>, DomainError> {
        let row: Option<JobRow> = sqlx::query_as(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error reading backup job: {}", e);
                map_db_error(e)
            })?;
        job_from(row)
    }
}

#[async_trait]
impl BackupRepository for PgBackupRepository {
    async fn create_config(&self, config: &BackupConfig) -> Result<BackupConfig, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO backup_configs ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {cols}
            "#,
            cols = CONFIG_COLUMNS
        );
        let row: ConfigRow = sqlx::query_as(&sql)
            .bind(config.id)
            .bind(config.backup_type.as_str())
            .bind(&config.modules)
            .bind(config.include_tenants)
            .bind(config.compression)
            .bind(config.encryption)
            .bind(config.retention_days)
            .bind(&config.schedule)
            .bind(config.active)
            .bind(config.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error creating backup config: {}", e);
                map_db_error(e)
            })?;

        row.try_into()
    }

    async fn find_config(&self, id: &Uuid) -> Result<Option<BackupConfig>, DomainError> {
        let sql = format!("SELECT {} FROM backup_configs WHERE id = $1", CONFIG_COLUMNS);
        let row: Option<ConfigRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(BackupConfig::try_from).transpose()
    }

    async fn list_configs(&self, active_only: bool) -> Result<Vec<BackupConfig>, DomainError> {
        let sql = format!(
            "SELECT {} FROM backup_configs WHERE ($1 = FALSE OR active = TRUE) ORDER BY created_at",
            CONFIG_COLUMNS
        );
        let rows: Vec<ConfigRow> = sqlx::query_as(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(BackupConfig::try_from).collect()
    }

    async fn update_config(&self, config: &BackupConfig) -> Result<BackupConfig, DomainError> {
        // Only the mutable fields of a policy are written back.
        let sql = format!(
            r#"
            UPDATE backup_configs
            SET active = $2, retention_days = $3
            WHERE id = $1
            RETURNING {}
            "#,
            CONFIG_COLUMNS
        );
        let row: Option<ConfigRow> = sqlx::query_as(&sql)
            .bind(config.id)
            .bind(config.active)
            .bind(config.retention_days)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.ok_or(DomainError::ConfigNotFoundOrInactive(config.id))?
            .try_into()
    }

    async fn start_job(&self, job: &BackupJob) -> Result<BackupJob, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO backup_jobs ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {cols}
            "#,
            cols = JOB_COLUMNS
        );
        let row: JobRow = sqlx::query_as(&sql)
            .bind(job.id)
            .bind(job.backup_config_id)
            .bind(job.status.as_str())
            .bind(job.started_at)
            .bind(job.completed_at)
            .bind(job.total_size_mb)
            .bind(job.compressed_size_mb)
            .bind(job.files_count)
            .bind(&job.checksum)
            .bind(&job.backup_location)
            .bind(&job.error_message)
            .bind(job.restore_started_at)
            .bind(job.effective_type.map(|t| t.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                if unique_violation(&e).as_deref() == Some(ONE_RUNNING_JOB) {
                    warn!(config_id = %job.backup_config_id, "Backup job already running");
                    return DomainError::BackupAlreadyRunning(job.backup_config_id);
                }
                error!("Database error starting backup job: {}", e);
                map_db_error(e)
            })?;

        row.try_into()
    }

    async fn complete_job(&self, job: &BackupJob, files: &[BackupFile]) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE backup_jobs
            SET status = $2,
                completed_at = $3,
                total_size_mb = $4,
                compressed_size_mb = $5,
                files_count = $6,
                checksum = $7,
                backup_location = $8,
                effective_type = $9
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.completed_at)
        .bind(job.total_size_mb)
        .bind(job.compressed_size_mb)
        .bind(job.files_count)
        .bind(&job.checksum)
        .bind(&job.backup_location)
        .bind(job.effective_type.map(|t| t.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if updated.rows_affected() == 0 {
            return Err(DomainError::BackupJobNotFound(job.id));
        }

        for file in files {
            sqlx::query(
                r#"
                INSERT INTO backup_files (
                    job_id, file_name, file_type, module_name, tenant_id, size_mb, checksum
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(file.job_id)
            .bind(&file.file_name)
            .bind(file.file_type.as_str())
            .bind(&file.module_name)
            .bind(file.tenant_id)
            .bind(file.size_mb)
            .bind(&file.checksum)
            .execute(&mut *tx)
            .await
            .map_err(|e: sqlx::Error| {
                error!(job_id = %job.id, file = %file.file_name, "Failed to record backup file: {}", e);
                map_db_error(e)
            })?;
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }

    async fn fail_job(&self, job: &BackupJob) -> Result<(), DomainError> {
        let updated = sqlx::query(
            r#"
            UPDATE backup_jobs
            SET status = $2, completed_at = $3, error_message = $4
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.completed_at)
        .bind(&job.error_message)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if updated.rows_affected() == 0 {
            return Err(DomainError::BackupJobNotFound(job.id));
        }
        Ok(())
    }

    async fn find_job(&self, id: &Uuid) -> Result<Option<BackupJob>, DomainError> {
        let sql = format!("SELECT {} FROM backup_jobs WHERE id = $1", JOB_COLUMNS);
        self.fetch_job(&sql, id).await
    }

    async fn list_jobs(&self, limit: i64, offset: i64) -> Result<Vec<BackupJob>, DomainError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM backup_jobs
            ORDER BY started_at DESC NULLS LAST, id
            LIMIT $1 OFFSET $2
            "#,
            JOB_COLUMNS
        );
        let rows: Vec<JobRow> = sqlx::query_as(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(BackupJob::try_from).collect()
    }

    async fn list_files(&self, job_id: &Uuid) -> Result<Vec<BackupFile>, DomainError> {
        let rows: Vec<FileRow> = sqlx::query_as(
            r#"
            SELECT job_id, file_name, file_type, module_name, tenant_id, size_mb, checksum
            FROM backup_files
            WHERE job_id = $1
            ORDER BY id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(BackupFile::try_from).collect()
    }

    async fn last_completed_job(&self, config_id: &Uuid) -> Result<Option<BackupJob>, DomainError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM backup_jobs
            WHERE backup_config_id = $1 AND status = 'completed'
            ORDER BY completed_at DESC
            LIMIT 1
            "#,
            JOB_COLUMNS
        );
        self.fetch_job(&sql, config_id).await
    }

    async fn oldest_full_job(&self, config_id: &Uuid) -> Result<Option<BackupJob>, DomainError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM backup_jobs
            WHERE backup_config_id = $1 AND status = 'completed' AND effective_type = 'full'
            ORDER BY completed_at ASC
            LIMIT 1
            "#,
            JOB_COLUMNS
        );
        self.fetch_job(&sql, config_id).await
    }

    async fn latest_job_for_module(&self, module: &str) -> Result<Option<BackupJob>, DomainError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM backup_jobs j
            WHERE EXISTS (
                SELECT 1 FROM backup_configs c
                WHERE c.id = j.backup_config_id AND $1 = ANY(c.modules)
            )
            ORDER BY j.started_at DESC NULLS LAST
            LIMIT 1
            "#,
            JOB_COLUMNS
        );
        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(module)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        job_from(row)
    }

    async fn delete_expired_jobs(
        &self,
        config_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        // backup_files rows go with their job through ON DELETE CASCADE.
        let result = sqlx::query(
            r#"
            DELETE FROM backup_jobs
            WHERE backup_config_id = $1
              AND status = 'completed'
              AND completed_at < $2
              AND restore_started_at IS NULL
            "#,
        )
        .bind(config_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!(config_id = %config_id, "Database error deleting expired jobs: {}", e);
            map_db_error(e)
        })?;

        Ok(result.rows_affected())
    }

    async fn acquire_restore_lease(
        &self,
        job_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<BackupJob, DomainError> {
        let sql = format!(
            r#"
            UPDATE backup_jobs
            SET restore_started_at = $2
            WHERE id = $1 AND status = 'completed' AND restore_started_at IS NULL
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let leased: Option<JobRow> = sqlx::query_as(&sql)
            .bind(job_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        if let Some(row) = leased {
            return row.try_into();
        }

        // Nothing updated: tell a missing job apart from one in the wrong state.
        match self.find_job(job_id).await? {
            None => Err(DomainError::BackupJobNotFound(*job_id)),
            Some(job) => Err(DomainError::RestoreNotAllowed(format!(
                "job {} is {} or already being restored",
                job_id, job.status
            ))),
        }
    }

    async fn release_restore_lease(&self, job_id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("UPDATE backup_jobs SET restore_started_at = NULL WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn fail_interrupted_jobs(&self, message: &str, at: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let failed = sqlx::query(
            r#"
            UPDATE backup_jobs
            SET status = 'failed', completed_at = $2, error_message = $1
            WHERE status = 'running'
            "#,
        )
        .bind(message)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?
        .rows_affected();

        let released = sqlx::query(
            "UPDATE backup_jobs SET restore_started_at = NULL WHERE restore_started_at IS NOT NULL",
        )
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?
        .rows_affected();

        tx.commit().await.map_err(map_db_error)?;

        if failed > 0 || released > 0 {
            info!(failed, released, "Recovered backup jobs interrupted by a previous shutdown");
        }
        Ok(failed)
    }
}
