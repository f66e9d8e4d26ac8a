//! Core migration catalog. Applied to every module of the fixed set.

use vault_core::domain::Migration;

pub const MIGRATION_HISTORY_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS migration_history (
    id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CORE_MIGRATIONS: [Migration; 6] = [
    Migration {
        id: "0001_create_tenants",
        description: "Tenant catalog",
        sql: r#"
CREATE TABLE IF NOT EXISTS tenants (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    module TEXT NOT NULL,
    schema_prefix TEXT NOT NULL,
    isolation_level TEXT NOT NULL
        CHECK (isolation_level IN ('schema', 'database', 'row_level')),
    max_users BIGINT NOT NULL CHECK (max_users >= 0),
    max_storage_mb BIGINT NOT NULL CHECK (max_storage_mb >= 0),
    max_api_calls_per_day BIGINT NOT NULL CHECK (max_api_calls_per_day >= 0),
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_activity TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS tenants_name_lower_key ON tenants (LOWER(name));
CREATE UNIQUE INDEX IF NOT EXISTS tenants_schema_prefix_key ON tenants (schema_prefix);
CREATE INDEX IF NOT EXISTS idx_tenants_active_created ON tenants (active, created_at DESC);
"#,
    },
    Migration {
        id: "0002_create_tenant_usage",
        description: "Daily tenant usage",
        sql: r#"
CREATE TABLE IF NOT EXISTS tenant_usage (
    tenant_id UUID NOT NULL REFERENCES tenants(id),
    usage_date DATE NOT NULL,
    api_calls BIGINT NOT NULL DEFAULT 0,
    storage_used_mb DOUBLE PRECISION NOT NULL DEFAULT 0,
    active_users BIGINT NOT NULL DEFAULT 0,
    bandwidth_mb DOUBLE PRECISION NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (tenant_id, usage_date)
);
"#,
    },
    Migration {
        id: "0003_create_backup_configs",
        description: "Backup policies",
        sql: r#"
CREATE TABLE IF NOT EXISTS backup_configs (
    id UUID PRIMARY KEY,
    backup_type TEXT NOT NULL CHECK (backup_type IN ('full', 'incremental', 'differential')),
    modules TEXT[] NOT NULL,
    include_tenants BOOLEAN NOT NULL DEFAULT FALSE,
    compression BOOLEAN NOT NULL DEFAULT TRUE,
    encryption BOOLEAN NOT NULL DEFAULT FALSE,
    retention_days INTEGER NOT NULL CHECK (retention_days BETWEEN 1 AND 3650),
    schedule TEXT NOT NULL DEFAULT 'manual',
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#,
    },
    Migration {
        id: "0004_create_backup_jobs",
        description: "Backup job attempts",
        sql: r#"
CREATE TABLE IF NOT EXISTS backup_jobs (
    id UUID PRIMARY KEY,
    backup_config_id UUID NOT NULL REFERENCES backup_configs(id),
    status TEXT NOT NULL CHECK (status IN ('pending', 'running', 'completed', 'failed')),
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    total_size_mb DOUBLE PRECISION NOT NULL DEFAULT 0,
    compressed_size_mb DOUBLE PRECISION NOT NULL DEFAULT 0,
    files_count INTEGER NOT NULL DEFAULT 0,
    checksum TEXT,
    backup_location TEXT,
    error_message TEXT,
    restore_started_at TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS backup_jobs_one_running
    ON backup_jobs (backup_config_id) WHERE status = 'running';
CREATE INDEX IF NOT EXISTS idx_backup_jobs_config_status
    ON backup_jobs (backup_config_id, status, completed_at);
CREATE INDEX IF NOT EXISTS idx_backup_jobs_started ON backup_jobs (started_at DESC);
"#,
    },
    Migration {
        id: "0005_create_backup_files",
        description: "Backup artifact manifest",
        sql: r#"
CREATE TABLE IF NOT EXISTS backup_files (
    id BIGSERIAL PRIMARY KEY,
    job_id UUID NOT NULL REFERENCES backup_jobs(id) ON DELETE CASCADE,
    file_name TEXT NOT NULL,
    file_type TEXT NOT NULL CHECK (file_type IN ('schema', 'data', 'tenant')),
    module_name TEXT NOT NULL,
    tenant_id UUID,
    size_mb DOUBLE PRECISION NOT NULL DEFAULT 0,
    checksum TEXT NOT NULL,
    UNIQUE (job_id, file_name)
);
"#,
    },
    Migration {
        id: "0006_backup_jobs_effective_type",
        description: "Record what each completed job captured",
        sql: r#"
ALTER TABLE backup_jobs ADD COLUMN IF NOT EXISTS effective_type TEXT
    CHECK (effective_type IN ('full', 'incremental', 'differential'));
CREATE INDEX IF NOT EXISTS idx_backup_jobs_full_baseline
    ON backup_jobs (backup_config_id, completed_at) WHERE status = 'completed' AND effective_type = 'full';
"#,
    },
];

/// Constraint names the repositories translate into domain errors.
pub const TENANT_NAME_UNIQUE: &str = "tenants_name_lower_key";
pub const TENANT_PREFIX_UNIQUE: &str = "tenants_schema_prefix_key";
pub const ONE_RUNNING_JOB: &str = "backup_jobs_one_running";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let ids: Vec<&str> = CORE_MIGRATIONS.iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_statements_are_rerunnable() {
        for migration in CORE_MIGRATIONS {
            for line in migration.sql.lines().filter(|l| l.starts_with("CREATE")) {
                assert!(line.contains("IF NOT EXISTS"), "{}: {}", migration.id, line);
            }
        }
    }

    #[test]
    fn test_columns_are_added_rerunnably() {
        for migration in CORE_MIGRATIONS {
            for line in migration.sql.lines().filter(|l| l.contains("ADD COLUMN")) {
                assert!(line.contains("ADD COLUMN IF NOT EXISTS"), "{}: {}", migration.id, line);
            }
        }
    }

    #[test]
    fn test_constraint_names_exist_in_ddl() {
        let all: String = CORE_MIGRATIONS.iter().map(|m| m.sql).collect();
        for name in [TENANT_NAME_UNIQUE, TENANT_PREFIX_UNIQUE, ONE_RUNNING_JOB] {
            assert!(all.contains(name));
        }
    }
}
