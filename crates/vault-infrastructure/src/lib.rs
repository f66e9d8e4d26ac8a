//! # Vault Infrastructure
//! 
//! PostgreSQL adapters, the artifact producer and HTTP gateway clients.

pub mod database;
pub mod artifacts;
pub mod gateways;

pub use database::{
    create_pool, map_db_error, PgBackupRepository, PgMigrationStore, PgTenantRepository,
    PgUsageRepository, PoolRegistry, CORE_MIGRATIONS,
};
pub use artifacts::PgArtifactProducer;
pub use gateways::{HttpIdentityProvider, HttpNotifier};
