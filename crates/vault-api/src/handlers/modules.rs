// ============================================================================
// Vault API - Module Handlers
// File: crates/vault-api/src/handlers/modules.rs
// ============================================================================

use axum::{
    extract::{Path, State},
    Json,
};
use vault_core::domain::{ModuleInitialization, ModuleStatus};
use vault_core::services::ModuleInitOutcome;

use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/modules
pub async fn list_modules(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(Json(ApiResponse::success(state.modules.modules())))
}

/// POST /api/v1/modules/initialize
pub async fn initialize_all(State(state): State<AppState>) -> ApiResult<Vec<ModuleInitOutcome>> {
    let outcomes = state.modules.initialize_all_modules().await;
    Ok(Json(ApiResponse::success(outcomes)))
}

/// POST /api/v1/modules/{name}/initialize
pub async fn initialize_module(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ModuleInitialization> {
    let initialization = state.modules.initialize_module(&name).await?;
    Ok(Json(ApiResponse::success(initialization)))
}

/// GET /api/v1/modules/{name}/status
pub async fn module_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ModuleStatus> {
    let status = state.modules.get_module_status(&name).await?;
    Ok(Json(ApiResponse::success(status)))
}
