//! Connection pool manager trait (port)

use async_trait::async_trait;

use crate::domain::PoolStats;
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ModuleConnector: Send + Sync {
    /// The fixed module set.
    fn modules(&self) -> Vec<String>;
    /// Open (or reuse) the module's pool.
    async fn connect(&self, module: &str) -> Result<PoolStats, DomainError>;
    /// Stats of an already open pool; never connects.
    fn pool_stats(&self, module: &str) -> Option<PoolStats>;
    async fn ping(&self, module: &str) -> Result<(), DomainError>;
}
