//! Domain errors

use thiserror::Error;
use uuid::Uuid;

use crate::domain::JobStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Connection timed out: {0}")]
    ConnectionTimeout(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Tenant name already exists: {0}")]
    DuplicateTenantName(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Tenant not active: {0}")]
    TenantNotActive(Uuid),

    #[error("Schema creation failed: {0}")]
    SchemaCreationError(String),

    #[error("Backup config not found or inactive: {0}")]
    ConfigNotFoundOrInactive(Uuid),

    #[error("A backup job is already running for config {0}")]
    BackupAlreadyRunning(Uuid),

    #[error("Backup execution failed: {0}")]
    BackupExecutionError(String),

    #[error("Backup job not found: {0}")]
    BackupJobNotFound(Uuid),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidJobTransition { from: JobStatus, to: JobStatus },

    #[error("Restore not allowed: {0}")]
    RestoreNotAllowed(String),

    #[error("Migration {migration} failed in module {module}: {message}")]
    MigrationError {
        module: String,
        migration: String,
        message: String,
    },

    #[error("Unknown module: {0}")]
    ModuleNotFound(String),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Stable machine-readable code used by the administrative surface.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::ConnectionError(_) => "CONNECTION_ERROR",
            DomainError::ConnectionTimeout(_) => "CONNECTION_TIMEOUT",
            DomainError::ValidationError(_) => "VALIDATION_ERROR",
            DomainError::DuplicateTenantName(_) => "DUPLICATE_TENANT_NAME",
            DomainError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            DomainError::TenantNotActive(_) => "TENANT_NOT_ACTIVE",
            DomainError::SchemaCreationError(_) => "SCHEMA_CREATION_ERROR",
            DomainError::ConfigNotFoundOrInactive(_) => "CONFIG_NOT_FOUND_OR_INACTIVE",
            DomainError::BackupAlreadyRunning(_) => "BACKUP_ALREADY_RUNNING",
            DomainError::BackupExecutionError(_) => "BACKUP_EXECUTION_ERROR",
            DomainError::BackupJobNotFound(_) => "BACKUP_JOB_NOT_FOUND",
            DomainError::InvalidJobTransition { .. } => "INVALID_JOB_TRANSITION",
            DomainError::RestoreNotAllowed(_) => "RESTORE_NOT_ALLOWED",
            DomainError::MigrationError { .. } => "MIGRATION_ERROR",
            DomainError::ModuleNotFound(_) => "MODULE_NOT_FOUND",
            DomainError::GatewayError(_) => "GATEWAY_ERROR",
            DomainError::DatabaseError(_) => "DATABASE_ERROR",
            DomainError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Only connection-class failures are worth retrying at the call site.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::ConnectionError(_) | DomainError::ConnectionTimeout(_)
        )
    }

    /// Caller mistakes: never retried, reported as client errors.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DomainError::ValidationError(_)
                | DomainError::DuplicateTenantName(_)
                | DomainError::ConfigNotFoundOrInactive(_)
                | DomainError::BackupAlreadyRunning(_)
                | DomainError::RestoreNotAllowed(_)
                | DomainError::InvalidJobTransition { .. }
        )
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::ValidationError(errors.to_string())
    }
}
