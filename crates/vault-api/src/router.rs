// ============================================================================
// Vault API - Router
// File: crates/vault-api/src/router.rs
// ============================================================================

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::handlers::{backups, health, modules, tenants};
use crate::middleware::require_admin_key;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Public routes (no admin key)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let admin_routes = Router::new()
        // Modules
        .route("/modules", get(modules::list_modules))
        .route("/modules/initialize", post(modules::initialize_all))
        .route("/modules/{name}/initialize", post(modules::initialize_module))
        .route("/modules/{name}/status", get(modules::module_status))
        // Tenants
        .route("/tenants", post(tenants::create_tenant).get(tenants::list_tenants))
        .route("/tenants/{id}", get(tenants::get_tenant))
        .route("/tenants/{id}/stats", get(tenants::tenant_stats))
        .route(
            "/tenants/{id}/limits",
            get(tenants::check_limits).put(tenants::update_limits),
        )
        .route("/tenants/{id}/usage", post(tenants::record_usage))
        .route("/tenants/{id}/deactivate", post(tenants::deactivate_tenant))
        // Backups
        .route(
            "/backups/configs",
            post(backups::create_config).get(backups::list_configs),
        )
        .route(
            "/backups/configs/{id}",
            get(backups::get_config).patch(backups::update_config),
        )
        .route("/backups/configs/{id}/execute", post(backups::execute_config))
        .route("/backups/cleanup", post(backups::cleanup))
        .route("/backups", get(backups::list_backups))
        .route("/backups/{job_id}", get(backups::get_backup))
        .route("/backups/{job_id}/restore", post(backups::restore_backup))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin_key));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(state)
}
