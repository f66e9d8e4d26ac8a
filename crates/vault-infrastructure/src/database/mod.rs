//! Database module (PostgreSQL adapters)

pub mod connection;
pub mod error;
pub mod migrations;
pub mod postgres;

pub use connection::{create_pool, PoolRegistry};
pub use error::map_db_error;
pub use migrations::CORE_MIGRATIONS;
pub use postgres::{PgBackupRepository, PgMigrationStore, PgTenantRepository, PgUsageRepository};
