//! PostgreSQL repository implementations

pub mod tenant_repo_impl;
pub mod usage_repo_impl;
pub mod backup_repo_impl;
pub mod migration_store_impl;

pub use tenant_repo_impl::PgTenantRepository;
pub use usage_repo_impl::PgUsageRepository;
pub use backup_repo_impl::PgBackupRepository;
pub use migration_store_impl::PgMigrationStore;
