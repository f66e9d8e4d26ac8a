//! In-memory fakes of the ports, shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use crate::domain::*;
use crate::error::DomainError;
use crate::gateways::BackupArtifactProducer;
use crate::repositories::{BackupRepository, MigrationStore, TenantRepository, UsageRepository};

#[derive(Default)]
struct State {
    tenants: Vec<Tenant>,
    schemas: HashSet<String>,
    stats: HashMap<Uuid, TenantStats>,
    usage: HashMap<(Uuid, NaiveDate), TenantUsage>,
    configs: Vec<BackupConfig>,
    jobs: Vec<BackupJob>,
    files: Vec<BackupFile>,
    history: HashMap<String, Vec<String>>,
}

/// One store standing in for the catalog database.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Index of the provisioning statement that should fail.
    fail_provision_at: Mutex<Option<usize>>,
    /// `(module, migration_id)` pairs that should fail.
    failing_migrations: Mutex<HashSet<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_provision_at(&self, statement: usize) {
        *self.fail_provision_at.lock().unwrap() = Some(statement);
    }

    pub fn fail_migration(&self, module: &str, id: &str) {
        self.failing_migrations
            .lock()
            .unwrap()
            .insert((module.to_string(), id.to_string()));
    }

    pub fn set_stats(&self, tenant_id: Uuid, stats: TenantStats) {
        self.state.lock().unwrap().stats.insert(tenant_id, stats);
    }

    pub fn tenant_count(&self) -> usize {
        self.state.lock().unwrap().tenants.len()
    }

    pub fn schema_count(&self) -> usize {
        self.state.lock().unwrap().schemas.len()
    }

    pub fn insert_job(&self, job: BackupJob, files: Vec<BackupFile>) {
        let mut state = self.state.lock().unwrap();
        state.jobs.push(job);
        state.files.extend(files);
    }

    /// Drop a job and its files, as an expired retention sweep would.
    pub fn remove_job(&self, job_id: &Uuid) {
        let mut state = self.state.lock().unwrap();
        state.jobs.retain(|j| &j.id != job_id);
        state.files.retain(|f| &f.job_id != job_id);
    }

    pub fn jobs(&self) -> Vec<BackupJob> {
        self.state.lock().unwrap().jobs.clone()
    }

    pub fn file_count(&self, job_id: &Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .filter(|f| &f.job_id == job_id)
            .count()
    }
}

#[async_trait]
impl TenantRepository for MemoryStore {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DomainError> {
        Ok(self.state.lock().unwrap().tenants.iter().find(|t| &t.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, DomainError> {
        let key = Tenant::normalized_name(name);
        Ok(self
            .state
            .lock()
            .unwrap()
            .tenants
            .iter()
            .find(|t| Tenant::normalized_name(&t.name) == key)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, DomainError> {
        let mut active: Vec<Tenant> = self
            .state
            .lock()
            .unwrap()
            .tenants
            .iter()
            .filter(|t| t.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn provision(&self, tenant: &Tenant, plan: &ProvisioningPlan) -> Result<Tenant, DomainError> {
        let fail_at = *self.fail_provision_at.lock().unwrap();
        let mut state = self.state.lock().unwrap();

        // Stage everything, publish only when every statement went through.
        let key = Tenant::normalized_name(&tenant.name);
        if state.tenants.iter().any(|t| Tenant::normalized_name(&t.name) == key) {
            return Err(DomainError::DuplicateTenantName(tenant.name.clone()));
        }
        if state.schemas.contains(&plan.schema) {
            return Err(DomainError::SchemaCreationError(format!(
                "schema {} already exists",
                plan.schema
            )));
        }
        for (index, statement) in plan.statements.iter().enumerate() {
            if fail_at == Some(index) {
                return Err(DomainError::SchemaCreationError(format!(
                    "statement {} failed: {}",
                    index, statement
                )));
            }
        }

        state.tenants.push(tenant.clone());
        state.schemas.insert(plan.schema.clone());
        Ok(tenant.clone())
    }

    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .tenants
            .iter_mut()
            .find(|t| t.id == tenant.id)
            .ok_or_else(|| DomainError::TenantNotFound(tenant.id.to_string()))?;
        *slot = tenant.clone();
        Ok(tenant.clone())
    }

    async fn touch_activity(&self, id: &Uuid, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if let Some(tenant) = state.tenants.iter_mut().find(|t| &t.id == id) {
            tenant.last_activity = Some(at);
        }
        Ok(())
    }

    async fn live_stats(&self, tenant: &Tenant) -> Result<TenantStats, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .stats
            .get(&tenant.id)
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl UsageRepository for MemoryStore {
    async fn record(
        &self,
        tenant_id: &Uuid,
        date: NaiveDate,
        delta: &UsageDelta,
    ) -> Result<TenantUsage, DomainError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .usage
            .entry((*tenant_id, date))
            .or_insert_with(|| TenantUsage::empty(*tenant_id, date));
        row.apply(delta);
        Ok(row.clone())
    }

    async fn find(&self, tenant_id: &Uuid, date: NaiveDate) -> Result<Option<TenantUsage>, DomainError> {
        Ok(self.state.lock().unwrap().usage.get(&(*tenant_id, date)).cloned())
    }
}

#[async_trait]
impl BackupRepository for MemoryStore {
    async fn create_config(&self, config: &BackupConfig) -> Result<BackupConfig, DomainError> {
        self.state.lock().unwrap().configs.push(config.clone());
        Ok(config.clone())
    }

    async fn find_config(&self, id: &Uuid) -> Result<Option<BackupConfig>, DomainError> {
        Ok(self.state.lock().unwrap().configs.iter().find(|c| &c.id == id).cloned())
    }

    async fn list_configs(&self, active_only: bool) -> Result<Vec<BackupConfig>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .configs
            .iter()
            .filter(|c| !active_only || c.active)
            .cloned()
            .collect())
    }

    async fn update_config(&self, config: &BackupConfig) -> Result<BackupConfig, DomainError> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .configs
            .iter_mut()
            .find(|c| c.id == config.id)
            .ok_or(DomainError::ConfigNotFoundOrInactive(config.id))?;
        slot.active = config.active;
        slot.retention_days = config.retention_days;
        Ok(slot.clone())
    }

    async fn start_job(&self, job: &BackupJob) -> Result<BackupJob, DomainError> {
        let mut state = self.state.lock().unwrap();
        if state
            .jobs
            .iter()
            .any(|j| j.backup_config_id == job.backup_config_id && j.status == JobStatus::Running)
        {
            return Err(DomainError::BackupAlreadyRunning(job.backup_config_id));
        }
        state.jobs.push(job.clone());
        Ok(job.clone())
    }

    async fn complete_job(&self, job: &BackupJob, files: &[BackupFile]) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job.id && j.status == JobStatus::Running)
            .ok_or(DomainError::BackupJobNotFound(job.id))?;
        *slot = job.clone();
        state.files.extend(files.iter().cloned());
        Ok(())
    }

    async fn fail_job(&self, job: &BackupJob) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job.id && j.status == JobStatus::Running)
            .ok_or(DomainError::BackupJobNotFound(job.id))?;
        *slot = job.clone();
        Ok(())
    }

    async fn find_job(&self, id: &Uuid) -> Result<Option<BackupJob>, DomainError> {
        Ok(self.state.lock().unwrap().jobs.iter().find(|j| &j.id == id).cloned())
    }

    async fn list_jobs(&self, limit: i64, offset: i64) -> Result<Vec<BackupJob>, DomainError> {
        let mut jobs = self.jobs();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(jobs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_files(&self, job_id: &Uuid) -> Result<Vec<BackupFile>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .iter()
            .filter(|f| &f.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn last_completed_job(&self, config_id: &Uuid) -> Result<Option<BackupJob>, DomainError> {
        Ok(self
            .jobs()
            .into_iter()
            .filter(|j| &j.backup_config_id == config_id && j.status == JobStatus::Completed)
            .max_by_key(|j| j.completed_at))
    }

    async fn oldest_full_job(&self, config_id: &Uuid) -> Result<Option<BackupJob>, DomainError> {
        Ok(self
            .jobs()
            .into_iter()
            .filter(|j| {
                &j.backup_config_id == config_id
                    && j.status == JobStatus::Completed
                    && j.effective_type == Some(BackupType::Full)
            })
            .min_by_key(|j| j.completed_at))
    }

    async fn latest_job_for_module(&self, module: &str) -> Result<Option<BackupJob>, DomainError> {
        let state = self.state.lock().unwrap();
        let configs: HashSet<Uuid> = state
            .configs
            .iter()
            .filter(|c| c.modules.iter().any(|m| m == module))
            .map(|c| c.id)
            .collect();
        Ok(state
            .jobs
            .iter()
            .filter(|j| configs.contains(&j.backup_config_id))
            .max_by_key(|j| j.started_at)
            .cloned())
    }

    async fn delete_expired_jobs(
        &self,
        config_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let mut state = self.state.lock().unwrap();
        let expired: HashSet<Uuid> = state
            .jobs
            .iter()
            .filter(|j| {
                &j.backup_config_id == config_id
                    && j.status == JobStatus::Completed
                    && j.restore_started_at.is_none()
                    && j.completed_at.map(|at| at < cutoff).unwrap_or(false)
            })
            .map(|j| j.id)
            .collect();
        state.jobs.retain(|j| !expired.contains(&j.id));
        state.files.retain(|f| !expired.contains(&f.job_id));
        Ok(expired.len() as u64)
    }

    async fn acquire_restore_lease(
        &self,
        job_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<BackupJob, DomainError> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| &j.id == job_id)
            .ok_or(DomainError::BackupJobNotFound(*job_id))?;
        if job.status != JobStatus::Completed || job.restore_started_at.is_some() {
            return Err(DomainError::RestoreNotAllowed(format!(
                "job {} is {} or already being restored",
                job_id, job.status
            )));
        }
        job.restore_started_at = Some(at);
        Ok(job.clone())
    }

    async fn release_restore_lease(&self, job_id: &Uuid) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|j| &j.id == job_id) {
            job.restore_started_at = None;
        }
        Ok(())
    }

    async fn fail_interrupted_jobs(&self, message: &str, at: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut state = self.state.lock().unwrap();
        let mut failed = 0;
        for job in state.jobs.iter_mut() {
            job.restore_started_at = None;
            if job.status == JobStatus::Running {
                job.fail(message, at)?;
                failed += 1;
            }
        }
        Ok(failed)
    }
}

#[async_trait]
impl MigrationStore for MemoryStore {
    async fn ensure_history(&self, module: &str) -> Result<(), DomainError> {
        self.state
            .lock()
            .unwrap()
            .history
            .entry(module.to_string())
            .or_default();
        Ok(())
    }

    async fn applied(&self, module: &str) -> Result<Vec<String>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .history
            .get(module)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply(&self, module: &str, migration: &Migration) -> Result<(), DomainError> {
        if self
            .failing_migrations
            .lock()
            .unwrap()
            .contains(&(module.to_string(), migration.id.to_string()))
        {
            return Err(DomainError::DatabaseError(format!(
                "syntax error in {}",
                migration.id
            )));
        }
        self.state
            .lock()
            .unwrap()
            .history
            .entry(module.to_string())
            .or_default()
            .push(migration.id.to_string());
        Ok(())
    }
}

/// Deterministic artifact producer. Optionally parks inside `produce` until the gate hands out a
/// permit, and can be told to fail for one module.
#[derive(Default)]
pub struct FakeProducer {
    pub entered: Arc<Notify>,
    gate: Option<Arc<Semaphore>>,
    fail_module: Mutex<Option<String>>,
    requests: Mutex<Vec<ArtifactRequest>>,
    restored: Mutex<Vec<String>>,
}

impl FakeProducer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(gate),
            ..Self::default()
        })
    }

    pub fn fail_for(&self, module: &str) {
        *self.fail_module.lock().unwrap() = Some(module.to_string());
    }

    pub fn requests(&self) -> Vec<ArtifactRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn restored(&self) -> Vec<String> {
        self.restored.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackupArtifactProducer for FakeProducer {
    async fn produce(&self, request: &ArtifactRequest) -> Result<Artifact, DomainError> {
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.fail_module.lock().unwrap().as_deref() == Some(request.module.as_str()) {
            return Err(DomainError::BackupExecutionError(format!(
                "dump of {} failed",
                request.module
            )));
        }
        self.requests.lock().unwrap().push(request.clone());

        let name = request.file_name();
        Ok(Artifact {
            size_mb: 1.0 + name.len() as f64 / 100.0,
            checksum: hex::encode(Sha256::digest(name.as_bytes())),
            file_type: request.file_type(),
            module_name: request.module.clone(),
            tenant_id: request.tenant_id(),
            name,
        })
    }

    async fn restore(&self, _file: &BackupFile, location: &str) -> Result<(), DomainError> {
        self.restored.lock().unwrap().push(location.to_string());
        Ok(())
    }
}
