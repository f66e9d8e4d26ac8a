//! Retention sweeper for completed backup jobs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::error::DomainError;
use crate::repositories::BackupRepository;

pub struct RetentionSweeper {
    backups: Arc<dyn BackupRepository>,
}

impl RetentionSweeper {
    pub fn new(backups: Arc<dyn BackupRepository>) -> Self {
        Self { backups }
    }

    /// Delete completed jobs older than their config's retention window.
    pub async fn cleanup_old_backups(&self) -> Result<u64, DomainError> {
        self.cleanup_at(Utc::now()).await
    }

    /// Same as `cleanup_old_backups`, evaluated at `now`.
    ///
    /// Running and failed jobs are never touched, and neither is a job under a restore lease.
    /// A config whose delete fails is logged and skipped so the others still get swept.
    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let configs = self.backups.list_configs(true).await?;
        let mut deleted = 0;

        for config in configs {
            let cutoff = now - Duration::days(i64::from(config.retention_days));
            match self.backups.delete_expired_jobs(&config.id, cutoff).await {
                Ok(0) => {}
                Ok(count) => {
                    info!(config_id = %config.id, count, %cutoff, "Expired backup jobs deleted");
                    deleted += count;
                }
                Err(e) => error!(config_id = %config.id, "Retention sweep failed: {}", e),
            }
        }

        info!(deleted, "Retention sweep finished");
        Ok(deleted)
    }
}
