use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: String,
    catalog_module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Ready once the catalog module answers a ping.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.connector.ping(&state.catalog_module).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready".to_string(),
                catalog_module: state.catalog_module.clone(),
                error: None,
            }),
        ),
        Err(e) => {
            warn!(module = %state.catalog_module, "Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "unavailable".to_string(),
                    catalog_module: state.catalog_module.clone(),
                    error: Some(e.code().to_string()),
                }),
            )
        }
    }
}
