//! Migration history store trait (port)

use async_trait::async_trait;

use crate::domain::Migration;
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Create the module's `migration_history` table when missing.
    async fn ensure_history(&self, module: &str) -> Result<(), DomainError>;
    async fn applied(&self, module: &str) -> Result<Vec<String>, DomainError>;
    /// Run the migration and record it in history, in one transaction.
    async fn apply(&self, module: &str, migration: &Migration) -> Result<(), DomainError>;
}
