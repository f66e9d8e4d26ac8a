// ============================================================================
// Vault Core - Backup Entities
// File: crates/vault-core/src/domain/backup.rs
// Description: Backup configs, jobs (state machine), files and artifacts
// ============================================================================

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use super::schedule::BackupSchedule;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    Full,
    Incremental,
    Differential,
}

impl BackupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Full => "full",
            BackupType::Incremental => "incremental",
            BackupType::Differential => "differential",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(BackupType::Full),
            "incremental" => Some(BackupType::Incremental),
            "differential" => Some(BackupType::Differential),
            _ => None,
        }
    }
}

/// `pending -> running -> {completed | failed}`. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Schema,
    Data,
    Tenant,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Schema => "schema",
            FileType::Data => "data",
            FileType::Tenant => "tenant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "schema" => Some(FileType::Schema),
            "data" => Some(FileType::Data),
            "tenant" => Some(FileType::Tenant),
            _ => None,
        }
    }
}

/// Operator request for a new backup policy.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewBackupConfig {
    pub backup_type: BackupType,

    #[validate(length(min = 1, message = "At least one module is required"))]
    pub modules: Vec<String>,

    #[serde(default)]
    pub include_tenants: bool,

    #[serde(default = "default_true")]
    pub compression: bool,

    #[serde(default)]
    pub encryption: bool,

    #[validate(range(min = 1, max = 3650, message = "retention_days must be between 1 and 3650"))]
    pub retention_days: i32,

    #[serde(default = "default_schedule")]
    pub schedule: String,
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "manual".to_string()
}

/// Backup policy. Only `active` and `retention_days` change once jobs reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub id: Uuid,
    pub backup_type: BackupType,
    pub modules: Vec<String>,
    pub include_tenants: bool,
    pub compression: bool,
    pub encryption: bool,
    pub retention_days: i32,
    pub schedule: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl BackupConfig {
    pub fn new(request: NewBackupConfig) -> Result<Self, DomainError> {
        request.validate()?;
        BackupSchedule::parse(&request.schedule)?;

        let mut modules: Vec<String> = Vec::with_capacity(request.modules.len());
        for module in request.modules {
            let module = module.trim().to_string();
            if module.is_empty() {
                return Err(DomainError::ValidationError("module names must not be blank".into()));
            }
            if !modules.contains(&module) {
                modules.push(module);
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            backup_type: request.backup_type,
            modules,
            include_tenants: request.include_tenants,
            compression: request.compression,
            encryption: request.encryption,
            retention_days: request.retention_days,
            schedule: request.schedule.trim().to_string(),
            active: true,
            created_at: Utc::now(),
        })
    }

    pub fn parsed_schedule(&self) -> Result<BackupSchedule, DomainError> {
        BackupSchedule::parse(&self.schedule)
    }
}

/// One execution attempt of a backup config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupJob {
    pub id: Uuid,
    pub backup_config_id: Uuid,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_size_mb: f64,
    pub compressed_size_mb: f64,
    pub files_count: i32,
    pub checksum: Option<String>,
    pub backup_location: Option<String>,
    pub error_message: Option<String>,
    pub restore_started_at: Option<DateTime<Utc>>,
    /// What the completed job actually captured; a differential without a baseline runs full.
    pub effective_type: Option<BackupType>,
}

impl BackupJob {
    /// A job that goes straight to `running`, as created by a trigger.
    pub fn running(backup_config_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            backup_config_id,
            status: JobStatus::Running,
            started_at: Some(started_at),
            completed_at: None,
            total_size_mb: 0.0,
            compressed_size_mb: 0.0,
            files_count: 0,
            checksum: None,
            backup_location: None,
            error_message: None,
            restore_started_at: None,
            effective_type: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidJobTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn complete(&mut self, summary: &JobSummary, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(JobStatus::Completed)?;
        self.completed_at = Some(at);
        self.total_size_mb = summary.total_size_mb;
        self.compressed_size_mb = summary.compressed_size_mb;
        self.files_count = summary.files_count;
        self.checksum = Some(summary.checksum.clone());
        self.backup_location = Some(summary.backup_location.clone());
        self.effective_type = Some(summary.effective_type);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(JobStatus::Failed)?;
        self.completed_at = Some(at);
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn is_restore_leased(&self) -> bool {
        self.restore_started_at.is_some()
    }
}

/// Aggregated outcome of all artifacts of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub effective_type: BackupType,
    pub total_size_mb: f64,
    pub compressed_size_mb: f64,
    pub files_count: i32,
    pub checksum: String,
    pub backup_location: String,
}

/// Manifest row for one artifact of a job; cascade-deleted with the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupFile {
    pub job_id: Uuid,
    pub file_name: String,
    pub file_type: FileType,
    pub module_name: String,
    pub tenant_id: Option<Uuid>,
    pub size_mb: f64,
    pub checksum: String,
}

impl BackupFile {
    pub fn from_artifact(job_id: Uuid, artifact: &Artifact) -> Self {
        Self {
            job_id,
            file_name: artifact.name.clone(),
            file_type: artifact.file_type,
            module_name: artifact.module_name.clone(),
            tenant_id: artifact.tenant_id,
            size_mb: artifact.size_mb,
            checksum: artifact.checksum.clone(),
        }
    }

    /// Object storage key: `{prefix}/{job_id}/{file}`.
    pub fn location(&self, storage_prefix: &str) -> String {
        format!("{}/{}", job_location(storage_prefix, &self.job_id), self.file_name)
    }
}

pub fn job_location(storage_prefix: &str, job_id: &Uuid) -> String {
    format!("{}/{}", storage_prefix.trim_end_matches('/'), job_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDetails {
    pub job: BackupJob,
    pub files: Vec<BackupFile>,
}

/// What the artifact producer is asked to capture.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactKind {
    Schema,
    Data,
    Tenant { tenant_id: Uuid, schema_prefix: String },
    Changes { since: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRequest {
    pub job_id: Uuid,
    pub module: String,
    pub kind: ArtifactKind,
    pub compression: bool,
    pub encryption: bool,
    pub taken_at: DateTime<Utc>,
}

impl ArtifactRequest {
    /// Deterministic artifact name for this request.
    pub fn file_name(&self) -> String {
        let stamp = self.taken_at.format("%Y%m%d%H%M%S");
        let base = match &self.kind {
            ArtifactKind::Schema => format!("{}_schema_{}", self.module, stamp),
            ArtifactKind::Data => format!("{}_data_{}", self.module, stamp),
            ArtifactKind::Tenant { schema_prefix, .. } => {
                format!("tenant_{}_{}", schema_prefix, stamp)
            }
            ArtifactKind::Changes { since } => format!(
                "{}_changes_{}_{}",
                self.module,
                since.format("%Y%m%d%H%M%S"),
                stamp
            ),
        };
        let mut name = format!("{}.sql", base);
        if self.compression {
            name.push_str(".gz");
        }
        if self.encryption {
            name.push_str(".enc");
        }
        name
    }

    pub fn file_type(&self) -> FileType {
        match self.kind {
            ArtifactKind::Schema => FileType::Schema,
            ArtifactKind::Data | ArtifactKind::Changes { .. } => FileType::Data,
            ArtifactKind::Tenant { .. } => FileType::Tenant,
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        match self.kind {
            ArtifactKind::Tenant { tenant_id, .. } => Some(tenant_id),
            _ => None,
        }
    }
}

/// Result of producing one artifact. `size_mb` is the uncompressed size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub file_type: FileType,
    pub module_name: String,
    pub tenant_id: Option<Uuid>,
    pub size_mb: f64,
    pub checksum: String,
}

/// Fraction of the original size kept after compression, per backup type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionPolicy {
    pub full_ratio: f64,
    pub incremental_ratio: f64,
}

impl CompressionPolicy {
    pub fn compressed_size(&self, backup_type: BackupType, enabled: bool, size_mb: f64) -> f64 {
        if !enabled {
            return size_mb;
        }
        match backup_type {
            BackupType::Full => size_mb * self.full_ratio,
            BackupType::Incremental | BackupType::Differential => size_mb * self.incremental_ratio,
        }
    }
}

/// SHA-256 over the sorted per-artifact checksums, so artifact order never matters.
pub fn aggregate_checksum<S: AsRef<str>>(checksums: &[S]) -> String {
    let mut sorted: Vec<&str> = checksums.iter().map(|c| c.as_ref()).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for checksum in sorted {
        hasher.update(checksum.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_request() -> NewBackupConfig {
        NewBackupConfig {
            backup_type: BackupType::Incremental,
            modules: vec!["platform".into(), " platform ".into(), "billing".into()],
            include_tenants: false,
            compression: true,
            encryption: false,
            retention_days: 30,
            schedule: "daily 02:00".into(),
        }
    }

    #[test]
    fn test_config_dedups_modules() {
        let config = BackupConfig::new(config_request()).unwrap();
        assert_eq!(config.modules, vec!["platform".to_string(), "billing".to_string()]);
        assert!(config.active);
    }

    #[test]
    fn test_config_rejects_bad_schedule_and_retention() {
        let mut req = config_request();
        req.schedule = "whenever".into();
        assert!(BackupConfig::new(req).is_err());

        let mut req = config_request();
        req.retention_days = 0;
        assert!(BackupConfig::new(req).is_err());

        let mut req = config_request();
        req.modules.clear();
        assert!(BackupConfig::new(req).is_err());
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let mut job = BackupJob::running(Uuid::new_v4(), Utc::now());
        job.fail("disk full", Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Failed);

        let summary = JobSummary {
            effective_type: BackupType::Full,
            total_size_mb: 1.0,
            compressed_size_mb: 0.3,
            files_count: 1,
            checksum: "abc".into(),
            backup_location: "backups/x".into(),
        };
        assert!(matches!(
            job.complete(&summary, Utc::now()),
            Err(DomainError::InvalidJobTransition { .. })
        ));
        assert!(job.fail("again", Utc::now()).is_err());
        assert_eq!(job.error_message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_transition_table() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_aggregate_checksum_ignores_order() {
        let a = aggregate_checksum(&["b2", "a1", "c3"]);
        let b = aggregate_checksum(&["c3", "b2", "a1"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, aggregate_checksum(&["a1", "b2"]));
    }

    #[test]
    fn test_compression_policy() {
        let policy = CompressionPolicy { full_ratio: 0.3, incremental_ratio: 0.2 };
        assert!((policy.compressed_size(BackupType::Full, true, 100.0) - 30.0).abs() < 1e-9);
        assert!((policy.compressed_size(BackupType::Incremental, true, 100.0) - 20.0).abs() < 1e-9);
        assert_eq!(policy.compressed_size(BackupType::Full, false, 100.0), 100.0);
    }

    #[test]
    fn test_artifact_file_names() {
        let taken_at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut request = ArtifactRequest {
            job_id: Uuid::new_v4(),
            module: "platform".into(),
            kind: ArtifactKind::Schema,
            compression: true,
            encryption: false,
            taken_at,
        };
        assert_eq!(request.file_name(), "platform_schema_20260102030405.sql.gz");
        assert_eq!(request.file_type(), FileType::Schema);

        request.kind = ArtifactKind::Changes { since: taken_at - chrono::Duration::hours(24) };
        request.compression = false;
        assert_eq!(
            request.file_name(),
            "platform_changes_20260101030405_20260102030405.sql"
        );
        assert_eq!(request.file_type(), FileType::Data);
    }

    #[test]
    fn test_file_location() {
        let job_id = Uuid::new_v4();
        let file = BackupFile {
            job_id,
            file_name: "platform_data.sql".into(),
            file_type: FileType::Data,
            module_name: "platform".into(),
            tenant_id: None,
            size_mb: 1.0,
            checksum: "x".into(),
        };
        assert_eq!(
            file.location("backups/"),
            format!("backups/{}/platform_data.sql", job_id)
        );
    }
}
