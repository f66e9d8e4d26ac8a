// ============================================================================
// Vault Core - Backup Job Engine
// File: crates/vault-core/src/services/backup_engine.rs
// ============================================================================
//! Backup configs, job execution, restore and job queries

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use vault_shared::config::BackupSettings;
use vault_shared::Pagination;

use super::notifications::OperatorNotifier;
use crate::domain::{
    aggregate_checksum, job_location, Artifact, ArtifactKind, ArtifactRequest, BackupConfig,
    BackupDetails, BackupFile, BackupJob, BackupType, CompressionPolicy, FileType, JobStatus,
    JobSummary, NewBackupConfig,
};
use crate::error::DomainError;
use crate::gateways::BackupArtifactProducer;
use crate::repositories::{BackupRepository, TenantRepository};

/// Knobs the engine reads from the `backup` config section.
#[derive(Debug, Clone)]
pub struct BackupPolicy {
    pub storage_prefix: String,
    pub compression: CompressionPolicy,
    pub default_incremental_window: Duration,
    pub job_timeout: StdDuration,
}

impl BackupPolicy {
    pub fn from_settings(settings: &BackupSettings) -> Self {
        Self {
            storage_prefix: settings.storage_prefix.clone(),
            compression: CompressionPolicy {
                full_ratio: settings.full_compression_ratio,
                incremental_ratio: settings.incremental_compression_ratio,
            },
            default_incremental_window: Duration::hours(settings.default_incremental_window_hours),
            job_timeout: StdDuration::from_secs(settings.job_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub job_id: Uuid,
    pub files_restored: usize,
    pub locations: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// What a job will capture, after resolving watermarks and baselines.
struct ExecutionPlan {
    effective_type: BackupType,
    requests: Vec<ArtifactRequest>,
}

pub struct BackupEngine {
    backups: Arc<dyn BackupRepository>,
    tenants: Arc<dyn TenantRepository>,
    producer: Arc<dyn BackupArtifactProducer>,
    notifications: OperatorNotifier,
    policy: BackupPolicy,
}

impl BackupEngine {
    pub fn new(
        backups: Arc<dyn BackupRepository>,
        tenants: Arc<dyn TenantRepository>,
        producer: Arc<dyn BackupArtifactProducer>,
        notifications: OperatorNotifier,
        policy: BackupPolicy,
    ) -> Self {
        Self {
            backups,
            tenants,
            producer,
            notifications,
            policy,
        }
    }

    // ------------------------------------------------------------------------
    // Configs
    // ------------------------------------------------------------------------

    pub async fn create_backup_config(
        &self,
        request: NewBackupConfig,
    ) -> Result<BackupConfig, DomainError> {
        let config = BackupConfig::new(request)?;
        let created = self.backups.create_config(&config).await?;

        info!(
            config_id = %created.id,
            backup_type = created.backup_type.as_str(),
            modules = ?created.modules,
            "Backup config created"
        );
        Ok(created)
    }

    pub async fn get_backup_config(&self, id: &Uuid) -> Result<Option<BackupConfig>, DomainError> {
        self.backups.find_config(id).await
    }

    pub async fn list_backup_configs(&self, active_only: bool) -> Result<Vec<BackupConfig>, DomainError> {
        self.backups.list_configs(active_only).await
    }

    pub async fn set_backup_config_active(
        &self,
        id: &Uuid,
        active: bool,
    ) -> Result<BackupConfig, DomainError> {
        let mut config = self.require_config(id).await?;
        config.active = active;
        let updated = self.backups.update_config(&config).await?;

        info!(config_id = %id, active, "Backup config activation changed");
        Ok(updated)
    }

    pub async fn update_retention_days(
        &self,
        id: &Uuid,
        retention_days: i32,
    ) -> Result<BackupConfig, DomainError> {
        if !(1..=3650).contains(&retention_days) {
            return Err(DomainError::ValidationError(
                "retention_days must be between 1 and 3650".into(),
            ));
        }

        let mut config = self.require_config(id).await?;
        config.retention_days = retention_days;
        self.backups.update_config(&config).await
    }

    async fn require_config(&self, id: &Uuid) -> Result<BackupConfig, DomainError> {
        self.backups
            .find_config(id)
            .await?
            .ok_or(DomainError::ConfigNotFoundOrInactive(*id))
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Run one backup of `config_id` to completion.
    ///
    /// At most one job per config is `running` at a time. Any failure after the job row exists
    /// is recorded on the job (`failed`, `error_message`) before being returned.
    #[instrument(skip(self), fields(config_id = %config_id))]
    pub async fn execute_backup_job(&self, config_id: &Uuid) -> Result<BackupJob, DomainError> {
        // 1. Config must exist and be active
        let config = match self.backups.find_config(config_id).await? {
            Some(config) if config.active => config,
            _ => {
                warn!("Backup config missing or inactive");
                return Err(DomainError::ConfigNotFoundOrInactive(*config_id));
            }
        };

        // 2 + 3. Insert the running job; the repository rejects a second running job
        let job = self
            .backups
            .start_job(&BackupJob::running(config.id, Utc::now()))
            .await?;
        info!(job_id = %job.id, backup_type = config.backup_type.as_str(), "Backup job started");

        // 4 + 5. Typed executor, bounded by the job timeout
        let outcome = match tokio::time::timeout(self.policy.job_timeout, self.run(&config, &job)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(DomainError::BackupExecutionError(format!(
                "job timed out after {:?}",
                self.policy.job_timeout
            ))),
        };

        // 6 / 7. Persist the terminal state
        match outcome {
            Ok((effective_type, artifacts)) => {
                self.record_success(&config, job, effective_type, artifacts).await
            }
            Err(cause) => Err(self.record_failure(job, cause).await),
        }
    }

    async fn run(
        &self,
        config: &BackupConfig,
        job: &BackupJob,
    ) -> Result<(BackupType, Vec<Artifact>), DomainError> {
        let taken_at = job.started_at.unwrap_or_else(Utc::now);
        let plan = self.plan(config, job.id, taken_at).await?;

        let mut artifacts = Vec::with_capacity(plan.requests.len());
        for request in &plan.requests {
            let artifact = self.producer.produce(request).await?;
            info!(
                job_id = %job.id,
                artifact = %artifact.name,
                size_mb = artifact.size_mb,
                "Artifact produced"
            );
            artifacts.push(artifact);
        }
        Ok((plan.effective_type, artifacts))
    }

    async fn plan(
        &self,
        config: &BackupConfig,
        job_id: Uuid,
        taken_at: DateTime<Utc>,
    ) -> Result<ExecutionPlan, DomainError> {
        match config.backup_type {
            BackupType::Full => self.full_plan(config, job_id, taken_at).await,
            BackupType::Incremental => {
                let watermark = self
                    .backups
                    .last_completed_job(&config.id)
                    .await?
                    .as_ref()
                    .and_then(capture_point)
                    .unwrap_or(taken_at - self.policy.default_incremental_window);

                Ok(changes_plan(config, BackupType::Incremental, job_id, watermark, taken_at))
            }
            BackupType::Differential => {
                match self.backups.oldest_full_job(&config.id).await? {
                    Some(baseline) => {
                        let since = capture_point(&baseline)
                            .unwrap_or(taken_at - self.policy.default_incremental_window);
                        Ok(changes_plan(config, BackupType::Differential, job_id, since, taken_at))
                    }
                    None => {
                        info!(config_id = %config.id, "No full baseline retained, taking a full backup");
                        self.full_plan(config, job_id, taken_at).await
                    }
                }
            }
        }
    }

    async fn full_plan(
        &self,
        config: &BackupConfig,
        job_id: Uuid,
        taken_at: DateTime<Utc>,
    ) -> Result<ExecutionPlan, DomainError> {
        let request = |module: &str, kind: ArtifactKind| ArtifactRequest {
            job_id,
            module: module.to_string(),
            kind,
            compression: config.compression,
            encryption: config.encryption,
            taken_at,
        };

        let mut requests = Vec::new();
        for module in &config.modules {
            requests.push(request(module, ArtifactKind::Schema));
            requests.push(request(module, ArtifactKind::Data));
        }

        if config.include_tenants {
            for tenant in self.tenants.list_active().await? {
                requests.push(request(
                    &tenant.module,
                    ArtifactKind::Tenant {
                        tenant_id: tenant.id,
                        schema_prefix: tenant.schema_prefix.clone(),
                    },
                ));
            }
        }

        Ok(ExecutionPlan {
            effective_type: BackupType::Full,
            requests,
        })
    }

    async fn record_success(
        &self,
        config: &BackupConfig,
        job: BackupJob,
        effective_type: BackupType,
        artifacts: Vec<Artifact>,
    ) -> Result<BackupJob, DomainError> {
        let files: Vec<BackupFile> = artifacts
            .iter()
            .map(|artifact| BackupFile::from_artifact(job.id, artifact))
            .collect();
        let total_size_mb: f64 = files.iter().map(|f| f.size_mb).sum();
        let checksums: Vec<&str> = files.iter().map(|f| f.checksum.as_str()).collect();

        let summary = JobSummary {
            effective_type,
            total_size_mb,
            compressed_size_mb: self.policy.compression.compressed_size(
                effective_type,
                config.compression,
                total_size_mb,
            ),
            files_count: files.len() as i32,
            checksum: aggregate_checksum(&checksums),
            backup_location: job_location(&self.policy.storage_prefix, &job.id),
        };

        let mut completed = job.clone();
        if let Err(e) = completed.complete(&summary, Utc::now()) {
            return Err(self.record_failure(job, e).await);
        }
        if let Err(e) = self.backups.complete_job(&completed, &files).await {
            return Err(self.record_failure(job, e).await);
        }

        info!(
            job_id = %completed.id,
            files = completed.files_count,
            total_size_mb = completed.total_size_mb,
            "Backup job completed"
        );
        self.notifications
            .notify(&format!(
                "Backup {} completed: {} files, {:.2} MB ({:.2} MB compressed)",
                completed.id,
                completed.files_count,
                completed.total_size_mb,
                completed.compressed_size_mb
            ))
            .await;
        Ok(completed)
    }

    /// Persist the job as failed and hand back the error for the caller.
    ///
    /// The job row keeps the root cause; storage failures reach the caller only as a pointer
    /// to the job.
    async fn record_failure(&self, mut job: BackupJob, cause: DomainError) -> DomainError {
        let message = match &cause {
            DomainError::BackupExecutionError(inner) => inner.clone(),
            other => other.to_string(),
        };
        let public = match &cause {
            DomainError::DatabaseError(_)
            | DomainError::ConnectionError(_)
            | DomainError::ConnectionTimeout(_) => {
                format!("storage failure ({}), see job {}", cause.code(), job.id)
            }
            _ => message.clone(),
        };
        error!(job_id = %job.id, "Backup job failed: {}", message);

        match job.fail(message.clone(), Utc::now()) {
            Ok(()) => {
                if let Err(e) = self.backups.fail_job(&job).await {
                    error!(job_id = %job.id, "Could not record job failure: {}", e);
                }
            }
            Err(e) => error!(job_id = %job.id, "Could not mark job failed: {}", e),
        }

        self.notifications
            .notify(&format!("Backup {} failed: {}", job.id, message))
            .await;

        DomainError::BackupExecutionError(public)
    }

    /// Fail jobs a previous process left `running` and drop its restore leases.
    ///
    /// Meant to run once at startup, before any trigger can fire. Jobs carry no
    /// owner, so every `running` job is failed: one server instance per catalog.
    pub async fn recover_interrupted_jobs(&self) -> Result<u64, DomainError> {
        let failed = self
            .backups
            .fail_interrupted_jobs("interrupted by process restart", Utc::now())
            .await?;
        if failed > 0 {
            warn!(failed, "Interrupted backup jobs marked failed");
        }
        Ok(failed)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Jobs, most recent first.
    pub async fn list_backups(&self, page: &Pagination) -> Result<Vec<BackupJob>, DomainError> {
        self.backups.list_jobs(page.limit(), page.offset()).await
    }

    pub async fn get_backup(&self, job_id: &Uuid) -> Result<BackupDetails, DomainError> {
        let job = self
            .backups
            .find_job(job_id)
            .await?
            .ok_or(DomainError::BackupJobNotFound(*job_id))?;
        let files = self.backups.list_files(job_id).await?;
        Ok(BackupDetails { job, files })
    }

    // ------------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------------

    /// Restore every artifact of a completed job, schema files first.
    ///
    /// The job is leased for the duration so the retention sweeper leaves it alone.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn restore_backup(&self, job_id: &Uuid) -> Result<RestoreReport, DomainError> {
        let started_at = Utc::now();
        let job = self.backups.acquire_restore_lease(job_id, started_at).await?;
        info!("Restore lease acquired");

        let outcome = self.restore_leased(&job).await;

        if let Err(e) = self.backups.release_restore_lease(job_id).await {
            error!("Could not release restore lease: {}", e);
        }

        match outcome {
            Ok(locations) => {
                let report = RestoreReport {
                    job_id: job.id,
                    files_restored: locations.len(),
                    locations,
                    started_at,
                    completed_at: Utc::now(),
                };
                info!(files = report.files_restored, "Restore completed");
                self.notifications
                    .notify(&format!(
                        "Backup {} restored ({} files)",
                        job.id, report.files_restored
                    ))
                    .await;
                Ok(report)
            }
            Err(e) => {
                error!("Restore failed: {}", e);
                self.notifications
                    .notify(&format!("Restore of backup {} failed: {}", job.id, e))
                    .await;
                Err(e)
            }
        }
    }

    async fn restore_leased(&self, job: &BackupJob) -> Result<Vec<String>, DomainError> {
        if job.status != JobStatus::Completed {
            return Err(DomainError::RestoreNotAllowed(format!(
                "job {} is {}",
                job.id, job.status
            )));
        }

        let mut files = self.backups.list_files(&job.id).await?;
        if files.len() != job.files_count as usize {
            return Err(DomainError::RestoreNotAllowed(format!(
                "manifest lists {} files, job recorded {}",
                files.len(),
                job.files_count
            )));
        }

        let checksums: Vec<&str> = files.iter().map(|f| f.checksum.as_str()).collect();
        if job.checksum.as_deref() != Some(aggregate_checksum(&checksums).as_str()) {
            return Err(DomainError::RestoreNotAllowed(format!(
                "checksum mismatch for job {}",
                job.id
            )));
        }

        files.sort_by(|a, b| {
            restore_rank(a.file_type)
                .cmp(&restore_rank(b.file_type))
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        let mut locations = Vec::with_capacity(files.len());
        for file in &files {
            let location = file.location(&self.policy.storage_prefix);
            self.producer.restore(file, &location).await?;
            locations.push(location);
        }
        Ok(locations)
    }
}

/// The instant a completed job captured; later changes belong to the next window.
fn capture_point(job: &BackupJob) -> Option<DateTime<Utc>> {
    job.started_at.or(job.completed_at)
}

fn changes_plan(
    config: &BackupConfig,
    backup_type: BackupType,
    job_id: Uuid,
    since: DateTime<Utc>,
    taken_at: DateTime<Utc>,
) -> ExecutionPlan {
    let requests = config
        .modules
        .iter()
        .map(|module| ArtifactRequest {
            job_id,
            module: module.clone(),
            kind: ArtifactKind::Changes { since },
            compression: config.compression,
            encryption: config.encryption,
            taken_at,
        })
        .collect();

    ExecutionPlan {
        effective_type: backup_type,
        requests,
    }
}

fn restore_rank(file_type: FileType) -> u8 {
    match file_type {
        FileType::Schema => 0,
        FileType::Data => 1,
        FileType::Tenant => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IsolationLevel, NewTenant, ResourceLimits};
    use crate::services::TenantProvisioner;
    use crate::testing::{FakeProducer, MemoryStore};
    use tokio::sync::Semaphore;

    fn policy() -> BackupPolicy {
        BackupPolicy {
            storage_prefix: "backups".into(),
            compression: CompressionPolicy {
                full_ratio: 0.3,
                incremental_ratio: 0.2,
            },
            default_incremental_window: Duration::hours(24),
            job_timeout: StdDuration::from_secs(5),
        }
    }

    fn engine(store: &Arc<MemoryStore>, producer: &Arc<FakeProducer>) -> BackupEngine {
        engine_with(store, producer, policy())
    }

    fn engine_with(
        store: &Arc<MemoryStore>,
        producer: &Arc<FakeProducer>,
        policy: BackupPolicy,
    ) -> BackupEngine {
        BackupEngine::new(
            store.clone(),
            store.clone(),
            producer.clone(),
            OperatorNotifier::disabled(),
            policy,
        )
    }

    fn config(backup_type: BackupType, modules: &[&str]) -> NewBackupConfig {
        NewBackupConfig {
            backup_type,
            modules: modules.iter().map(|m| m.to_string()).collect(),
            include_tenants: false,
            compression: true,
            encryption: false,
            retention_days: 30,
            schedule: "manual".into(),
        }
    }

    #[tokio::test]
    async fn test_incremental_runs_twice_with_watermark() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Incremental, &["platform"]))
            .await
            .unwrap();

        let first = engine.execute_backup_job(&cfg.id).await.unwrap();
        assert_eq!(first.status, JobStatus::Completed);
        assert!(first.total_size_mb > 0.0);
        assert_eq!(first.files_count, 1);

        let second = engine.execute_backup_job(&cfg.id).await.unwrap();
        assert_eq!(second.status, JobStatus::Completed);
        assert_ne!(second.id, first.id);
        assert_eq!(second.files_count, 1);
        assert!(second.checksum.is_some());

        let requests = producer.requests();
        let ArtifactKind::Changes { since: first_since } = requests[0].kind else {
            panic!("expected a changes artifact");
        };
        let ArtifactKind::Changes { since: second_since } = requests[1].kind else {
            panic!("expected a changes artifact");
        };
        let first_started = first.started_at.unwrap();
        assert!(first_since <= first_started - Duration::hours(23));
        assert_eq!(second_since, first_started);
    }

    #[tokio::test]
    async fn test_full_backup_with_tenants() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        TenantProvisioner::new(store.clone(), vec!["platform".into()], OperatorNotifier::disabled())
            .create_tenant(NewTenant {
                name: "AcmeCorp".into(),
                module: "platform".into(),
                resource_limits: ResourceLimits::default(),
                isolation_level: IsolationLevel::Schema,
            })
            .await
            .unwrap();

        let engine = engine(&store, &producer);
        let mut request = config(BackupType::Full, &["platform", "billing"]);
        request.include_tenants = true;
        let cfg = engine.create_backup_config(request).await.unwrap();

        let job = engine.execute_backup_job(&cfg.id).await.unwrap();

        assert_eq!(job.files_count, 5);
        assert_eq!(store.file_count(&job.id), 5);
        assert!((job.compressed_size_mb - job.total_size_mb * 0.3).abs() < 1e-9);
        assert_eq!(job.backup_location, Some(format!("backups/{}", job.id)));

        let details = engine.get_backup(&job.id).await.unwrap();
        let checksums: Vec<&str> = details.files.iter().map(|f| f.checksum.as_str()).collect();
        assert_eq!(job.checksum, Some(aggregate_checksum(&checksums)));
        assert_eq!(
            details.files.iter().filter(|f| f.file_type == FileType::Tenant).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_differential_without_baseline_runs_full() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Differential, &["analytics"]))
            .await
            .unwrap();

        let baseline = engine.execute_backup_job(&cfg.id).await.unwrap();
        assert_eq!(baseline.files_count, 2);

        engine.execute_backup_job(&cfg.id).await.unwrap();
        let third = engine.execute_backup_job(&cfg.id).await.unwrap();
        assert_eq!(third.files_count, 1);

        let last = producer.requests().pop().unwrap();
        assert_eq!(
            last.kind,
            ArtifactKind::Changes { since: baseline.started_at.unwrap() }
        );
    }

    #[tokio::test]
    async fn test_differential_rebases_when_full_baseline_expires() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Differential, &["analytics"]))
            .await
            .unwrap();

        let full = engine.execute_backup_job(&cfg.id).await.unwrap();
        assert_eq!(full.effective_type, Some(BackupType::Full));
        let diff = engine.execute_backup_job(&cfg.id).await.unwrap();
        assert_eq!(diff.effective_type, Some(BackupType::Differential));

        // Retention removes the oldest job first, leaving only the differential.
        store.remove_job(&full.id);

        let next = engine.execute_backup_job(&cfg.id).await.unwrap();
        assert_eq!(next.files_count, 2);
        assert_eq!(next.effective_type, Some(BackupType::Full));
        let kinds: Vec<ArtifactKind> = producer
            .requests()
            .into_iter()
            .rev()
            .take(2)
            .map(|r| r.kind)
            .collect();
        assert!(kinds.iter().all(|k| !matches!(k, ArtifactKind::Changes { .. })));
    }

    #[tokio::test]
    async fn test_no_two_running_jobs_for_one_config() {
        let store = MemoryStore::new();
        let gate = Arc::new(Semaphore::new(0));
        let producer = FakeProducer::gated(gate.clone());
        let engine = Arc::new(engine(&store, &producer));
        let cfg = engine
            .create_backup_config(config(BackupType::Incremental, &["platform"]))
            .await
            .unwrap();

        let first = {
            let engine = engine.clone();
            let id = cfg.id;
            tokio::spawn(async move { engine.execute_backup_job(&id).await })
        };
        producer.entered.notified().await;

        let err = engine.execute_backup_job(&cfg.id).await.unwrap_err();
        assert!(matches!(err, DomainError::BackupAlreadyRunning(id) if id == cfg.id));

        gate.add_permits(1);
        let job = first.await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(store.jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_configs_run_concurrently() {
        let store = MemoryStore::new();
        let gate = Arc::new(Semaphore::new(0));
        let producer = FakeProducer::gated(gate.clone());
        let engine = Arc::new(engine(&store, &producer));
        let a = engine
            .create_backup_config(config(BackupType::Incremental, &["platform"]))
            .await
            .unwrap();
        let b = engine
            .create_backup_config(config(BackupType::Incremental, &["billing"]))
            .await
            .unwrap();

        let handles: Vec<_> = [a.id, b.id]
            .into_iter()
            .map(|id| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.execute_backup_job(&id).await })
            })
            .collect();
        let running = || {
            store
                .jobs()
                .iter()
                .filter(|j| j.status == JobStatus::Running)
                .count()
        };
        for _ in 0..200 {
            if running() == 2 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        assert_eq!(running(), 2);

        gate.add_permits(2);
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_producer_failure_marks_job_failed() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        producer.fail_for("billing");
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Full, &["platform", "billing"]))
            .await
            .unwrap();

        let err = engine.execute_backup_job(&cfg.id).await.unwrap_err();
        assert!(matches!(err, DomainError::BackupExecutionError(ref m) if m.contains("billing")));

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert!(jobs[0].error_message.as_deref().unwrap().contains("billing"));
        assert_eq!(store.file_count(&jobs[0].id), 0);

        // The failed job does not block the next attempt.
        let fixed = FakeProducer::new();
        let retry = engine_with(&store, &fixed, policy());
        assert!(retry.execute_backup_job(&cfg.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_cause_on_job_only() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Full, &["platform"]))
            .await
            .unwrap();

        let job = store
            .start_job(&BackupJob::running(cfg.id, Utc::now()))
            .await
            .unwrap();
        let err = engine
            .record_failure(
                job.clone(),
                DomainError::DatabaseError("relation \"backup_files\" does not exist".into()),
            )
            .await;

        let DomainError::BackupExecutionError(message) = err else {
            panic!("expected a backup execution error");
        };
        assert!(!message.contains("backup_files"));
        assert!(message.contains(&job.id.to_string()));

        let stored = store.jobs().into_iter().find(|j| j.id == job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error_message.unwrap().contains("backup_files"));
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let store = MemoryStore::new();
        let producer = FakeProducer::gated(Arc::new(Semaphore::new(0)));
        let mut short = policy();
        short.job_timeout = StdDuration::from_millis(50);
        let engine = engine_with(&store, &producer, short);
        let cfg = engine
            .create_backup_config(config(BackupType::Incremental, &["platform"]))
            .await
            .unwrap();

        let err = engine.execute_backup_job(&cfg.id).await.unwrap_err();

        assert!(matches!(err, DomainError::BackupExecutionError(ref m) if m.contains("timed out")));
        assert_eq!(store.jobs()[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_inactive_or_missing_config_rejected() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Full, &["platform"]))
            .await
            .unwrap();
        engine.set_backup_config_active(&cfg.id, false).await.unwrap();

        let err = engine.execute_backup_job(&cfg.id).await.unwrap_err();
        assert_eq!(err, DomainError::ConfigNotFoundOrInactive(cfg.id));

        let missing = Uuid::new_v4();
        let err = engine.execute_backup_job(&missing).await.unwrap_err();
        assert_eq!(err, DomainError::ConfigNotFoundOrInactive(missing));
        assert!(store.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_restore_orders_schema_first_and_releases_lease() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Full, &["platform"]))
            .await
            .unwrap();
        let job = engine.execute_backup_job(&cfg.id).await.unwrap();

        let report = engine.restore_backup(&job.id).await.unwrap();

        assert_eq!(report.files_restored, 2);
        let restored = producer.restored();
        assert!(restored[0].contains("_schema_"));
        assert!(restored[1].contains("_data_"));
        assert!(restored[0].starts_with(&format!("backups/{}/", job.id)));
        assert!(!store.jobs()[0].is_restore_leased());
    }

    #[tokio::test]
    async fn test_restore_rejects_tampered_manifest() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);

        let mut job = BackupJob::running(Uuid::new_v4(), Utc::now());
        job.complete(
            &JobSummary {
                effective_type: BackupType::Full,
                total_size_mb: 1.0,
                compressed_size_mb: 0.3,
                files_count: 1,
                checksum: "not-the-real-checksum".into(),
                backup_location: format!("backups/{}", job.id),
            },
            Utc::now(),
        )
        .unwrap();
        let file = BackupFile {
            job_id: job.id,
            file_name: "platform_data.sql".into(),
            file_type: FileType::Data,
            module_name: "platform".into(),
            tenant_id: None,
            size_mb: 1.0,
            checksum: "abc".into(),
        };
        store.insert_job(job.clone(), vec![file]);

        let err = engine.restore_backup(&job.id).await.unwrap_err();

        assert!(matches!(err, DomainError::RestoreNotAllowed(_)));
        assert!(producer.restored().is_empty());
        assert!(!store.jobs()[0].is_restore_leased());
    }

    #[tokio::test]
    async fn test_failed_job_not_restorable() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let mut job = BackupJob::running(Uuid::new_v4(), Utc::now());
        job.fail("boom", Utc::now()).unwrap();
        store.insert_job(job.clone(), vec![]);

        let err = engine.restore_backup(&job.id).await.unwrap_err();
        assert!(matches!(err, DomainError::RestoreNotAllowed(_)));
    }

    #[tokio::test]
    async fn test_recover_interrupted_jobs_unblocks_config() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Incremental, &["platform"]))
            .await
            .unwrap();
        store.insert_job(BackupJob::running(cfg.id, Utc::now()), vec![]);

        assert!(matches!(
            engine.execute_backup_job(&cfg.id).await,
            Err(DomainError::BackupAlreadyRunning(_))
        ));

        assert_eq!(engine.recover_interrupted_jobs().await.unwrap(), 1);
        assert_eq!(store.jobs()[0].status, JobStatus::Failed);
        assert!(engine.execute_backup_job(&cfg.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_retention_update_validated() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Full, &["platform"]))
            .await
            .unwrap();

        assert!(engine.update_retention_days(&cfg.id, 0).await.is_err());
        let updated = engine.update_retention_days(&cfg.id, 7).await.unwrap();
        assert_eq!(updated.retention_days, 7);
        assert_eq!(engine.list_backup_configs(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_backups_pages() {
        let store = MemoryStore::new();
        let producer = FakeProducer::new();
        let engine = engine(&store, &producer);
        let cfg = engine
            .create_backup_config(config(BackupType::Incremental, &["platform"]))
            .await
            .unwrap();
        let first = engine.execute_backup_job(&cfg.id).await.unwrap();
        let second = engine.execute_backup_job(&cfg.id).await.unwrap();

        let page_one = engine
            .list_backups(&Pagination { page: 1, per_page: 1 })
            .await
            .unwrap();
        let page_two = engine
            .list_backups(&Pagination { page: 2, per_page: 1 })
            .await
            .unwrap();
        assert_eq!(page_one.len(), 1);
        assert_eq!(page_two.len(), 1);
        assert!(page_one[0].started_at >= page_two[0].started_at);
        let mut ids = vec![page_one[0].id, page_two[0].id];
        ids.sort();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
