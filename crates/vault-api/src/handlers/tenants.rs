// ============================================================================
// Vault API - Tenant Handlers
// File: crates/vault-api/src/handlers/tenants.rs
// ============================================================================
//! Tenant provisioning, lookup, usage and limits

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use vault_core::domain::{LimitCheck, NewTenant, ResourceLimits, Tenant, TenantStatsReport, TenantUsage, UsageDelta};
use vault_core::services::{OnboardingResult, TenantLookup};

use super::parse_id;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/tenants
pub async fn create_tenant(
    State(state): State<AppState>,
    payload: Result<Json<NewTenant>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<OnboardingResult>>), ApiError> {
    let Json(request) = payload?;
    let result = state.onboarding.onboard_tenant(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(result))))
}

/// GET /api/v1/tenants
pub async fn list_tenants(State(state): State<AppState>) -> ApiResult<Vec<Tenant>> {
    let tenants = state.registry.list_active_tenants().await?;
    Ok(Json(ApiResponse::success(tenants)))
}

/// GET /api/v1/tenants/{id}; the segment may also be a tenant name.
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Tenant> {
    let lookup = TenantLookup::parse(&raw);
    let tenant = state
        .registry
        .get_tenant(&lookup)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tenant {} not found", raw)))?;
    Ok(Json(ApiResponse::success(tenant)))
}

/// GET /api/v1/tenants/{id}/stats
pub async fn tenant_stats(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<TenantStatsReport> {
    let id = parse_id(&raw)?;
    let report = state.registry.get_tenant_stats(&id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// GET /api/v1/tenants/{id}/limits
pub async fn check_limits(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<LimitCheck> {
    let id = parse_id(&raw)?;
    let check = state.quota.check_limits(&id).await?;
    Ok(Json(ApiResponse::success(check)))
}

/// POST /api/v1/tenants/{id}/usage
pub async fn record_usage(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    payload: Result<Json<UsageDelta>, JsonRejection>,
) -> ApiResult<TenantUsage> {
    let id = parse_id(&raw)?;
    let Json(delta) = payload?;
    let row = state.registry.record_usage(&id, &delta).await?;
    Ok(Json(ApiResponse::success(row)))
}

/// PUT /api/v1/tenants/{id}/limits
pub async fn update_limits(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    payload: Result<Json<ResourceLimits>, JsonRejection>,
) -> ApiResult<Tenant> {
    let id = parse_id(&raw)?;
    let Json(limits) = payload?;
    let tenant = state.registry.update_limits(&id, limits).await?;
    Ok(Json(ApiResponse::success(tenant)))
}

/// POST /api/v1/tenants/{id}/deactivate
pub async fn deactivate_tenant(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Tenant> {
    let id = parse_id(&raw)?;
    let tenant = state.registry.deactivate_tenant(&id).await?;
    Ok(Json(ApiResponse::success(tenant)))
}
