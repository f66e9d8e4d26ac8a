//! Repository traits (ports)

pub mod tenant_repository;
pub mod usage_repository;
pub mod backup_repository;
pub mod migration_store;
pub mod module_connector;

pub use tenant_repository::TenantRepository;
pub use usage_repository::UsageRepository;
pub use backup_repository::BackupRepository;
pub use migration_store::MigrationStore;
pub use module_connector::ModuleConnector;

#[cfg(any(test, feature = "mocks"))]
pub use tenant_repository::MockTenantRepository;
#[cfg(any(test, feature = "mocks"))]
pub use usage_repository::MockUsageRepository;
#[cfg(any(test, feature = "mocks"))]
pub use backup_repository::MockBackupRepository;
#[cfg(any(test, feature = "mocks"))]
pub use migration_store::MockMigrationStore;
#[cfg(any(test, feature = "mocks"))]
pub use module_connector::MockModuleConnector;
