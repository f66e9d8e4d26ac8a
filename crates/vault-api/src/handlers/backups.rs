// ============================================================================
// Vault API - Backup Handlers
// File: crates/vault-api/src/handlers/backups.rs
// ============================================================================
//! Backup configs, jobs, restore and retention

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use vault_core::domain::{BackupConfig, BackupDetails, BackupJob, NewBackupConfig};
use vault_core::services::RestoreReport;
use vault_shared::Pagination;

use super::parse_id;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFilter {
    #[serde(default)]
    pub active_only: bool,
}

/// Only these two fields of a config can change after creation.
#[derive(Debug, Deserialize)]
pub struct UpdateBackupConfig {
    pub active: Option<bool>,
    pub retention_days: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted_jobs: u64,
}

/// POST /api/v1/backups/configs
pub async fn create_config(
    State(state): State<AppState>,
    payload: Result<Json<NewBackupConfig>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<BackupConfig>>), ApiError> {
    let Json(request) = payload?;
    let config = state.backups.create_backup_config(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(config))))
}

/// GET /api/v1/backups/configs
pub async fn list_configs(
    State(state): State<AppState>,
    Query(filter): Query<ConfigFilter>,
) -> ApiResult<Vec<BackupConfig>> {
    let configs = state.backups.list_backup_configs(filter.active_only).await?;
    Ok(Json(ApiResponse::success(configs)))
}

/// GET /api/v1/backups/configs/{id}
pub async fn get_config(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<BackupConfig> {
    let id = parse_id(&raw)?;
    let config = state
        .backups
        .get_backup_config(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("backup config {} not found", id)))?;
    Ok(Json(ApiResponse::success(config)))
}

/// PATCH /api/v1/backups/configs/{id}
pub async fn update_config(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    payload: Result<Json<UpdateBackupConfig>, JsonRejection>,
) -> ApiResult<BackupConfig> {
    let id = parse_id(&raw)?;
    let Json(update) = payload?;
    if update.active.is_none() && update.retention_days.is_none() {
        return Err(ApiError::BadRequest(
            "nothing to update: send active and/or retention_days".into(),
        ));
    }

    let mut config = None;
    if let Some(days) = update.retention_days {
        config = Some(state.backups.update_retention_days(&id, days).await?);
    }
    if let Some(active) = update.active {
        config = Some(state.backups.set_backup_config_active(&id, active).await?);
    }

    config
        .map(|c| Json(ApiResponse::success(c)))
        .ok_or_else(|| ApiError::NotFound(format!("backup config {} not found", id)))
}

/// POST /api/v1/backups/configs/{id}/execute
pub async fn execute_config(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<BackupJob> {
    let id = parse_id(&raw)?;
    let job = state.backups.execute_backup_job(&id).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// GET /api/v1/backups?page=&per_page=
pub async fn list_backups(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Vec<BackupJob>> {
    let jobs = state.backups.list_backups(&page).await?;
    Ok(Json(ApiResponse::success(jobs)))
}

/// GET /api/v1/backups/{job_id}
pub async fn get_backup(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<BackupDetails> {
    let id = parse_id(&raw)?;
    let details = state.backups.get_backup(&id).await?;
    Ok(Json(ApiResponse::success(details)))
}

/// POST /api/v1/backups/{job_id}/restore
pub async fn restore_backup(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<RestoreReport> {
    let id = parse_id(&raw)?;
    let report = state.backups.restore_backup(&id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// POST /api/v1/backups/cleanup
pub async fn cleanup(State(state): State<AppState>) -> ApiResult<CleanupResponse> {
    let deleted_jobs = state.retention.cleanup_old_backups().await?;
    Ok(Json(ApiResponse::success(CleanupResponse { deleted_jobs })))
}
