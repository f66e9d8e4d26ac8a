// ============================================================================
// Vault Infrastructure - PostgreSQL Artifact Producer
// File: crates/vault-infrastructure/src/artifacts/pg_producer.rs
// Description: Measures and fingerprints module state for backup manifests
// ============================================================================

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, instrument, warn};

use vault_core::domain::identifier::{qualified, quote_ident};
use vault_core::domain::{Artifact, ArtifactKind, ArtifactRequest, BackupFile, FileType};
use vault_core::error::DomainError;
use vault_core::gateways::BackupArtifactProducer;
use vault_shared::utils::bytes_to_mb;

use crate::database::connection::PoolRegistry;
use crate::database::error::map_db_error;

/// Schemas never captured by a module artifact.
const SYSTEM_SCHEMAS: &str = "('pg_catalog', 'information_schema', 'pg_toast')";

#[derive(Debug, FromRow)]
struct ColumnRow {
    table_schema: String,
    table_name: String,
    column_name: String,
    data_type: String,
    is_nullable: String,
}

#[derive(Debug, FromRow)]
struct RelationRow {
    schema_name: String,
    table_name: String,
    live_rows: i64,
    size_bytes: i64,
}

#[derive(Debug, FromRow)]
struct TimestampedTable {
    table_schema: String,
    table_name: String,
    column_name: String,
}

/// Manifest text plus the byte size it stands for.
struct Capture {
    manifest: String,
    size_bytes: i64,
}

impl Capture {
    fn into_artifact(self, request: &ArtifactRequest) -> Artifact {
        let checksum = hex::encode(Sha256::digest(self.manifest.as_bytes()));
        // The manifest itself always ships, so an artifact is never empty.
        let size_bytes = self.size_bytes.max(0) + self.manifest.len() as i64;
        Artifact {
            name: request.file_name(),
            file_type: request.file_type(),
            module_name: request.module.clone(),
            tenant_id: request.tenant_id(),
            size_mb: bytes_to_mb(size_bytes),
            checksum,
        }
    }
}

/// Artifact producer backed by the module databases themselves.
///
/// Byte transport to object storage is outside this crate; the producer captures a
/// deterministic manifest (DDL, relation sizes, change counts) whose SHA-256 is the artifact
/// checksum.
///
/// `restore` only checks that the target module database is reachable; it moves no bytes.
pub struct PgArtifactProducer {
    registry: Arc<PoolRegistry>,
}

impl PgArtifactProducer {
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self { registry }
    }

    async fn capture_schema(&self, pool: &PgPool, header: String) -> Result<Capture, DomainError> {
        let sql = format!(
            r#"
            SELECT c.table_schema, c.table_name, c.column_name, c.data_type, c.is_nullable
            FROM information_schema.columns c
            JOIN information_schema.tables t
              ON t.table_schema = c.table_schema AND t.table_name = c.table_name
            WHERE t.table_type = 'BASE TABLE'
              AND c.table_schema NOT IN {}
            ORDER BY c.table_schema, c.table_name, c.ordinal_position
            "#,
            SYSTEM_SCHEMAS
        );
        let columns: Vec<ColumnRow> = sqlx::query_as(&sql)
            .fetch_all(pool)
            .await
            .map_err(map_db_error)?;

        let mut manifest = header;
        let mut current: Option<(String, String)> = None;
        for col in &columns {
            let table = (col.table_schema.clone(), col.table_name.clone());
            if current.as_ref() != Some(&table) {
                if current.is_some() {
                    manifest.push_str(");\n");
                }
                let _ = writeln!(manifest, "CREATE TABLE {}.{} (", table.0, table.1);
                current = Some(table);
            }
            let nullable = if col.is_nullable == "NO" { " NOT NULL" } else { "" };
            let _ = writeln!(manifest, "    {} {}{},", col.column_name, col.data_type, nullable);
        }
        if current.is_some() {
            manifest.push_str(");\n");
        }

        let size_bytes = manifest.len() as i64;
        Ok(Capture { manifest, size_bytes })
    }

    async fn relations(&self, pool: &PgPool, schema: Option<&str>) -> Result<Vec<RelationRow>, DomainError> {
        let sql = format!(
            r#"
            SELECT
                n.nspname AS schema_name,
                c.relname AS table_name,
                GREATEST(c.reltuples, 0)::BIGINT AS live_rows,
                pg_total_relation_size(c.oid)::BIGINT AS size_bytes
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind = 'r'
              AND n.nspname NOT IN {}
              AND ($1::TEXT IS NULL OR n.nspname = $1)
            ORDER BY n.nspname, c.relname
            "#,
            SYSTEM_SCHEMAS
        );
        sqlx::query_as(&sql)
            .bind(schema)
            .fetch_all(pool)
            .await
            .map_err(map_db_error)
    }

    async fn capture_relations(
        &self,
        pool: &PgPool,
        schema: Option<&str>,
        header: String,
    ) -> Result<Capture, DomainError> {
        let relations = self.relations(pool, schema).await?;
        let mut manifest = header;
        let mut size_bytes = 0i64;
        for rel in &relations {
            let _ = writeln!(
                manifest,
                "{}.{} rows={} bytes={}",
                rel.schema_name, rel.table_name, rel.live_rows, rel.size_bytes
            );
            size_bytes += rel.size_bytes;
        }
        Ok(Capture { manifest, size_bytes })
    }

    async fn capture_changes(
        &self,
        pool: &PgPool,
        since: DateTime<Utc>,
        header: String,
    ) -> Result<Capture, DomainError> {
        let sql = format!(
            r#"
            SELECT table_schema, table_name, column_name
            FROM information_schema.columns
            WHERE column_name IN ('updated_at', 'created_at')
              AND data_type LIKE 'timestamp%'
              AND table_schema NOT IN {}
            ORDER BY table_schema, table_name,
                     CASE column_name WHEN 'updated_at' THEN 0 ELSE 1 END
            "#,
            SYSTEM_SCHEMAS
        );
        let candidates: Vec<TimestampedTable> = sqlx::query_as(&sql)
            .fetch_all(pool)
            .await
            .map_err(map_db_error)?;

        let mut manifest = header;
        let mut size_bytes = 0i64;
        let mut seen: Option<(String, String)> = None;
        for table in candidates {
            let key = (table.table_schema.clone(), table.table_name.clone());
            // `updated_at` sorts first; one column per table is enough.
            if seen.as_ref() == Some(&key) {
                continue;
            }
            seen = Some(key);

            let (target, column) = match (
                qualified(&table.table_schema, &table.table_name),
                quote_ident(&table.column_name),
            ) {
                (Ok(target), Ok(column)) => (target, column),
                _ => {
                    debug!(
                        schema = %table.table_schema,
                        table = %table.table_name,
                        "Skipping table with non-portable identifier"
                    );
                    continue;
                }
            };

            let count_sql = format!(
                "SELECT COUNT(*)::BIGINT, COALESCE(SUM(pg_column_size(t.*)), 0)::BIGINT \
                 FROM {} t WHERE t.{} > $1",
                target, column
            );
            let (rows, bytes): (i64, i64) = sqlx::query_as(&count_sql)
                .bind(since)
                .fetch_one(pool)
                .await
                .map_err(map_db_error)?;

            if rows > 0 {
                let _ = writeln!(manifest, "{} changed={} bytes={}", target, rows, bytes);
                size_bytes += bytes;
            }
        }

        Ok(Capture { manifest, size_bytes })
    }
}

#[async_trait]
impl BackupArtifactProducer for PgArtifactProducer {
    #[instrument(skip(self, request), fields(job_id = %request.job_id, module = %request.module))]
    async fn produce(&self, request: &ArtifactRequest) -> Result<Artifact, DomainError> {
        let header = format!(
            "-- module={} taken_at={}\n",
            request.module,
            request.taken_at.to_rfc3339()
        );

        let capture = match &request.kind {
            ArtifactKind::Schema => {
                let pool = self.registry.get(&request.module).await?;
                self.capture_schema(&pool, header).await?
            }
            ArtifactKind::Data => {
                let pool = self.registry.get(&request.module).await?;
                self.capture_relations(&pool, None, header).await?
            }
            ArtifactKind::Tenant { schema_prefix, .. } => {
                // Tenant schemas live next to the catalog.
                let pool = self.registry.catalog().await?;
                self.capture_relations(&pool, Some(schema_prefix), header).await?
            }
            ArtifactKind::Changes { since } => {
                let pool = self.registry.get(&request.module).await?;
                let header = format!("{}-- since={}\n", header, since.to_rfc3339());
                self.capture_changes(&pool, *since, header).await?
            }
        };

        let artifact = capture.into_artifact(request);
        info!(
            artifact = %artifact.name,
            size_mb = artifact.size_mb,
            "Backup artifact captured"
        );
        Ok(artifact)
    }

    async fn restore(&self, file: &BackupFile, location: &str) -> Result<(), DomainError> {
        let pool = match file.file_type {
            FileType::Tenant => self.registry.catalog().await?,
            FileType::Schema | FileType::Data => self.registry.get(&file.module_name).await?,
        };

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e: sqlx::Error| {
                warn!(location, "Restore target unreachable: {}", e);
                map_db_error(e)
            })?;

        info!(
            file = %file.file_name,
            module = %file.module_name,
            location,
            "Restore target reachable; no data moved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(kind: ArtifactKind) -> ArtifactRequest {
        ArtifactRequest {
            job_id: Uuid::new_v4(),
            module: "billing".into(),
            kind,
            compression: true,
            encryption: false,
            taken_at: Utc::now(),
        }
    }

    #[test]
    fn test_capture_checksum_is_manifest_digest() {
        let capture = Capture {
            manifest: "-- module=billing\npublic.invoices rows=3 bytes=8192\n".into(),
            size_bytes: 8192,
        };
        let expected = hex::encode(Sha256::digest(capture.manifest.as_bytes()));
        let artifact = capture.into_artifact(&request(ArtifactKind::Data));

        assert_eq!(artifact.checksum, expected);
        assert_eq!(artifact.file_type, FileType::Data);
        assert!(artifact.name.ends_with(".sql.gz"));
    }

    #[test]
    fn test_empty_capture_still_has_size() {
        let capture = Capture {
            manifest: "-- module=billing\n".into(),
            size_bytes: 0,
        };
        let artifact = capture.into_artifact(&request(ArtifactKind::Changes { since: Utc::now() }));
        assert!(artifact.size_mb > 0.0);
    }

    #[test]
    fn test_tenant_artifact_carries_tenant_id() {
        let tenant_id = Uuid::new_v4();
        let capture = Capture {
            manifest: "x".into(),
            size_bytes: 10,
        };
        let artifact = capture.into_artifact(&request(ArtifactKind::Tenant {
            tenant_id,
            schema_prefix: "t_acme_0011aabb".into(),
        }));
        assert_eq!(artifact.tenant_id, Some(tenant_id));
        assert_eq!(artifact.file_type, FileType::Tenant);
    }
}
