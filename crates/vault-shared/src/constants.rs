//! Application-wide constants

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;
pub const MAX_SCHEMA_PREFIX_LENGTH: usize = 48;
pub const SCHEMA_PREFIX_SUFFIX_LENGTH: usize = 8;
pub const SCHEMA_PREFIX_MARKER: &str = "t";

pub const TENANT_TABLES: [&str; 3] = ["users", "sessions", "tenant_data"];

pub const DEFAULT_CATALOG_MODULE: &str = "platform";
pub const DEFAULT_MODULES: [&str; 4] = ["platform", "analytics", "billing", "audit"];

pub const DEFAULT_BACKUP_STORAGE_PREFIX: &str = "backups";
pub const DEFAULT_INCREMENTAL_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_FULL_COMPRESSION_RATIO: f64 = 0.30;
pub const DEFAULT_INCREMENTAL_COMPRESSION_RATIO: f64 = 0.20;

pub const DEFAULT_MAX_USERS: i64 = 100;
pub const DEFAULT_MAX_STORAGE_MB: i64 = 1024;
pub const DEFAULT_MAX_API_CALLS_PER_DAY: i64 = 10_000;

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";
