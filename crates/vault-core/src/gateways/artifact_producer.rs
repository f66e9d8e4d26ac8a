//! Backup artifact producer trait (port)

use async_trait::async_trait;

use crate::domain::{Artifact, ArtifactRequest, BackupFile};
use crate::error::DomainError;

/// Produces and restores the artifacts behind a backup job. The byte transport (dump, compress,
/// upload) lives behind this trait; the engine only sees names, sizes and checksums.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait BackupArtifactProducer: Send + Sync {
    async fn produce(&self, request: &ArtifactRequest) -> Result<Artifact, DomainError>;
    /// Restore one artifact previously written to `location`.
    async fn restore(&self, file: &BackupFile, location: &str) -> Result<(), DomainError>;
}
